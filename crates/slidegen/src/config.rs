use crate::prelude::*;
use slidegen_core::outcome::ErrorKind;
use slidegen_core::settings::Settings;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "slidegen";
const SETTINGS_FILE: &str = "config.toml";
const ROTATION_FILE: &str = "rotation";
const GEMINI_KEY_PREFIX: &str = "GEMINI_API_KEY_";

/// Default location of the settings file.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}

/// Load settings from `path`, or from the default location.
///
/// An explicit path must exist; a missing default file means defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_settings_path() {
            Some(path) => (path, false),
            None => return Ok(Settings::default()),
        },
    };

    if !path.exists() {
        if explicit {
            return Err(eyre!("Settings file not found: {}", path.display()));
        }
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| eyre!("Failed to read settings file {}: {}", path.display(), e))?;
    Settings::from_toml(&content).map_err(|e| eyre!("{} ({})", e, path.display()))
}

/// Per-user state directory, created on demand.
pub fn state_dir() -> Result<PathBuf> {
    let dir = dirs_next::data_dir()
        .ok_or_else(|| eyre!("Unable to determine data directory"))?
        .join(APP_DIR);

    std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create state directory: {}", e))?;

    Ok(dir)
}

pub fn rotation_state_path() -> Result<PathBuf> {
    Ok(state_dir()?.join(ROTATION_FILE))
}

/// Table API configuration from environment variables
#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub api_key: String,
    pub base_url: String,
}

impl AirtableConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.airtable.com/v0";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: std::env::var("AIRTABLE_BASE_URL")
                .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Load configuration from environment variables, preferring `api_key`
    /// over `AIRTABLE_API_KEY` when given.
    pub fn from_env_or(api_key: Option<String>) -> std::result::Result<Self, Error> {
        api_key
            .or_else(|| std::env::var("AIRTABLE_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| {
                Error::configuration(
                    ErrorKind::MissingDataSourceKey,
                    "AIRTABLE_API_KEY environment variable not set",
                )
            })
    }
}

/// Completion keys from `GEMINI_API_KEY_1`, `GEMINI_API_KEY_2`, ...
///
/// Numbering starts at 1 and stops at the first gap. Blank values are skipped.
pub fn gemini_keys_from<I>(vars: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut numbered: Vec<(usize, String)> = vars
        .into_iter()
        .filter_map(|(name, value)| {
            let index = name.strip_prefix(GEMINI_KEY_PREFIX)?.parse::<usize>().ok()?;
            Some((index, value))
        })
        .collect();
    numbered.sort_by_key(|(index, _)| *index);

    let mut keys = Vec::new();
    for (expected, (index, value)) in (1..).zip(numbered) {
        if index != expected {
            break;
        }
        if !value.trim().is_empty() {
            keys.push(value);
        }
    }
    keys
}

pub fn gemini_keys_from_env() -> std::result::Result<Vec<String>, Error> {
    let keys = gemini_keys_from(std::env::vars());
    if keys.is_empty() {
        return Err(Error::configuration(
            ErrorKind::MissingAiKeys,
            "No GEMINI_API_KEY_<n> environment variables set",
        ));
    }
    Ok(keys)
}
