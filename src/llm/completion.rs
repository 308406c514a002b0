//! HTTP completion backend for a local inference server

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::LanguageModel;
use crate::config::ModelConfig;
use crate::{Error, Result};

/// Wire protocol spoken by the inference server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionApi {
    /// llama.cpp server (`POST /completion`)
    #[default]
    LlamaCpp,
    /// OpenAI-compatible (`POST /v1/completions`)
    OpenAi,
}

impl CompletionApi {
    /// Parse from a config string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "llamacpp" | "llama.cpp" | "llama" => Some(Self::LlamaCpp),
            "openai" | "openai-compatible" => Some(Self::OpenAi),
            _ => None,
        }
    }

    const fn generate_path(self) -> &'static str {
        match self {
            Self::LlamaCpp => "completion",
            Self::OpenAi => "v1/completions",
        }
    }

    const fn health_path(self) -> &'static str {
        match self {
            Self::LlamaCpp => "health",
            Self::OpenAi => "v1/models",
        }
    }
}

#[derive(Serialize)]
struct LlamaCppRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
}

#[derive(Deserialize)]
struct LlamaCppResponse {
    content: String,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    text: String,
}

/// Language model served over HTTP
///
/// Uses a blocking client, so construct and call it off the async runtime
/// (`spawn_blocking` or a dedicated thread).
pub struct CompletionModel {
    client: reqwest::blocking::Client,
    base_url: url::Url,
    api: CompletionApi,
    model: String,
}

impl std::fmt::Debug for CompletionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionModel")
            .field("base_url", &self.base_url.as_str())
            .field("api", &self.api)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl CompletionModel {
    /// Build a client for the configured inference server without contacting it
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let mut base_url = url::Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("invalid model URL '{}': {e}", config.url)))?;

        // Keep any path prefix when joining endpoint paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api: config.api,
            model: config.model.clone(),
        })
    }

    /// Build the client and verify the inference server answers
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or reports itself unhealthy
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let model = Self::new(config)?;
        model.check_health()?;

        tracing::info!(
            url = %model.base_url,
            api = ?model.api,
            model = %model.model,
            "language model loaded"
        );
        Ok(model)
    }

    /// Check that the inference server is up
    ///
    /// # Errors
    ///
    /// Returns error if the health request fails or returns a non-success status
    pub fn check_health(&self) -> Result<()> {
        let url = self.endpoint(self.api.health_path())?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Model(format!("inference server unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Model(format!(
                "inference server not ready ({})",
                response.status()
            )));
        }

        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<url::Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint path '{path}': {e}")))
    }

    fn generate_llamacpp(&self, prompt: &str, max_new_tokens: u32) -> Result<String> {
        let request = LlamaCppRequest {
            prompt,
            n_predict: max_new_tokens,
        };

        let response = self
            .client
            .post(self.endpoint(self.api.generate_path())?)
            .json(&request)
            .send()
            .map_err(|e| Error::Model(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Model(format!("completion error {status}: {body}")));
        }

        let result: LlamaCppResponse = response
            .json()
            .map_err(|e| Error::Model(format!("malformed completion response: {e}")))?;
        Ok(result.content)
    }

    fn generate_openai(&self, prompt: &str, max_new_tokens: u32) -> Result<String> {
        let request = OpenAiRequest {
            model: &self.model,
            prompt,
            max_tokens: max_new_tokens,
        };

        let response = self
            .client
            .post(self.endpoint(self.api.generate_path())?)
            .json(&request)
            .send()
            .map_err(|e| Error::Model(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Model(format!("completion error {status}: {body}")));
        }

        let result: OpenAiResponse = response
            .json()
            .map_err(|e| Error::Model(format!("malformed completion response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| Error::Model("completion response had no choices".to_string()))
    }
}

impl LanguageModel for CompletionModel {
    fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String> {
        tracing::debug!(
            prompt_len = prompt.len(),
            max_new_tokens,
            "requesting completion"
        );

        let text = match self.api {
            CompletionApi::LlamaCpp => self.generate_llamacpp(prompt, max_new_tokens)?,
            CompletionApi::OpenAi => self.generate_openai(prompt, max_new_tokens)?,
        };

        tracing::debug!(response_len = text.len(), "completion received");
        Ok(text)
    }
}
