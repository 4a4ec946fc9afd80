use crate::prelude::*;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::ollama;
use slidegen_core::gemini::{endpoint, GenerateContentRequest, GenerateContentResponse};
use slidegen_core::rotation::RotationCursor;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("No completion credentials configured")]
    NoCredentials,
    #[error("Request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Response contained no text")]
    EmptyResponse,
    #[error("All {attempts} completion attempts failed")]
    Exhausted { attempts: usize },
}

/// A text completion backend.
#[allow(async_fn_in_trait)]
pub trait CompletionService {
    async fn complete(&mut self, prompt: &str, system: &str)
        -> std::result::Result<String, CompletionError>;
}

/// One completion attempt with an explicit credential.
#[allow(async_fn_in_trait)]
pub trait KeyedCompletion {
    async fn complete_with_key(
        &self,
        key: &str,
        prompt: &str,
        system: &str,
    ) -> std::result::Result<String, CompletionError>;
}

/// Gemini `generateContent` over HTTP.
pub struct GeminiHttp {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiHttp {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

impl KeyedCompletion for GeminiHttp {
    async fn complete_with_key(
        &self,
        key: &str,
        prompt: &str,
        system: &str,
    ) -> std::result::Result<String, CompletionError> {
        let url = endpoint(&self.base_url, &self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&GenerateContentRequest::new(prompt, system))
            .send()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;
        body.text().ok_or(CompletionError::EmptyResponse)
    }
}

/// Persisted rotation cursor.
#[derive(Debug, Clone)]
pub struct RotationState {
    path: PathBuf,
}

impl RotationState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self, len: usize) -> RotationCursor {
        let state = tokio::fs::read_to_string(&self.path).await.ok();
        RotationCursor::from_state(state.as_deref(), len)
    }

    pub async fn save(&self, cursor: &RotationCursor) -> Result<()> {
        tokio::fs::write(&self.path, cursor.to_state()).await.map_err(|e| {
            eyre!(
                "Failed to save rotation state to {}: {}",
                self.path.display(),
                e
            )
        })
    }
}

/// Tries each credential in turn, starting where the last successful call
/// left off.
pub struct Rotating<C> {
    inner: C,
    keys: Vec<String>,
    cursor: RotationCursor,
    state: Option<RotationState>,
}

pub type GeminiClient = Rotating<GeminiHttp>;

impl<C: KeyedCompletion> Rotating<C> {
    pub fn new(inner: C, keys: Vec<String>, state: Option<RotationState>) -> Self {
        let cursor = RotationCursor::new(0, keys.len());
        Self {
            inner,
            keys,
            cursor,
            state,
        }
    }

    /// Resume from the persisted cursor, if any.
    pub async fn restore(mut self) -> Self {
        if let Some(state) = &self.state {
            self.cursor = state.load(self.keys.len()).await;
        }
        self
    }

    pub fn with_cursor(mut self, next: usize) -> Self {
        self.cursor = RotationCursor::new(next, self.keys.len());
        self
    }

    pub fn cursor(&self) -> RotationCursor {
        self.cursor
    }
}

impl<C: KeyedCompletion> CompletionService for Rotating<C> {
    async fn complete(
        &mut self,
        prompt: &str,
        system: &str,
    ) -> std::result::Result<String, CompletionError> {
        if self.cursor.is_empty() {
            return Err(CompletionError::NoCredentials);
        }

        let order: Vec<usize> = self.cursor.attempt_order().collect();
        for (attempt, index) in order.iter().copied().enumerate() {
            log::debug!("Attempt {}: using API key {}", attempt + 1, index + 1);
            match self
                .inner
                .complete_with_key(&self.keys[index], prompt, system)
                .await
            {
                Ok(text) => {
                    self.cursor.after_success(index);
                    if let Some(state) = &self.state {
                        if let Err(e) = state.save(&self.cursor).await {
                            log::warn!("{}", e);
                        }
                    }
                    return Ok(text);
                }
                Err(e) => log::warn!("API key {} failed: {}", index + 1, e),
            }
        }

        log::warn!("All API keys exhausted. No response received.");
        Err(CompletionError::Exhausted {
            attempts: order.len(),
        })
    }
}

/// Local model through Ollama.
pub struct OllamaClient {
    client: ollama::Client,
    model: String,
}

impl OllamaClient {
    pub fn new(ollama_url: &str, model: impl Into<String>) -> Result<Self> {
        use rig::client::Nothing;

        let client = ollama::Client::builder()
            .api_key(Nothing)
            .base_url(ollama_url)
            .build()
            .map_err(|e| eyre!("Failed to create Ollama client: {}", e))?;

        Ok(Self {
            client,
            model: model.into(),
        })
    }
}

impl CompletionService for OllamaClient {
    async fn complete(
        &mut self,
        prompt: &str,
        system: &str,
    ) -> std::result::Result<String, CompletionError> {
        let agent = self.client.agent(&self.model).preamble(system).build();
        let response = agent
            .prompt(prompt)
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let text = response.trim();
        if text.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

/// Completion backend chosen on the command line.
pub enum Backend {
    Gemini(GeminiClient),
    Ollama(OllamaClient),
    /// No credentials configured; every request fails.
    Disabled,
}

impl CompletionService for Backend {
    async fn complete(
        &mut self,
        prompt: &str,
        system: &str,
    ) -> std::result::Result<String, CompletionError> {
        match self {
            Backend::Gemini(client) => client.complete(prompt, system).await,
            Backend::Ollama(client) => client.complete(prompt, system).await,
            Backend::Disabled => Err(CompletionError::NoCredentials),
        }
    }
}
