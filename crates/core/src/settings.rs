//! Optional settings file
//!
//! Defaults that rarely change between runs live in a TOML file instead of
//! flags. Every key is optional:
//!
//! ```toml
//! [gemini]
//! model = "gemini-2.0-flash"
//! base_url = "https://generativelanguage.googleapis.com/v1beta"
//!
//! [ollama]
//! url = "http://localhost:11434"
//! model = "llama3.2"
//!
//! [images]
//! placeholder_base = "https://via.placeholder.com"
//!
//! [refinement]
//! enabled = true
//! ```

use serde::Deserialize;

use crate::image::DEFAULT_PLACEHOLDER_BASE;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

#[derive(Debug, thiserror::Error)]
#[error("Invalid settings file: {0}")]
pub struct SettingsError(#[from] toml::de::Error);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub model: String,
    pub base_url: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub url: String,
    pub model: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub placeholder_base: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            placeholder_base: DEFAULT_PLACEHOLDER_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RefinementSettings {
    pub enabled: bool,
}

impl Default for RefinementSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gemini: GeminiSettings,
    pub ollama: OllamaSettings,
    pub images: ImageSettings,
    pub refinement: RefinementSettings,
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }
}
