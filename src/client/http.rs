//! HTTP client for the turn server

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::TurnClient;
use crate::db::Interaction;
use crate::{Error, Result};

/// Default request timeout; turns include model inference
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Serialize)]
struct TurnRequest<'a> {
    user_id: &'a str,
    user_input: &'a str,
}

#[derive(Deserialize)]
struct TurnResponse {
    response: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct InteractionsResponse {
    interactions: Vec<Interaction>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Client for the assistant's HTTP API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    user_id: String,
}

impl ApiClient {
    /// Create a client for the server at `base_url`, acting as `user_id`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built
    pub fn new(base_url: &str, user_id: impl Into<String>) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| Error::Config(format!("invalid server URL: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            user_id: user_id.into(),
        })
    }

    /// The user this client speaks for
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Run a conversation turn
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the server is unreachable, or the server's
    /// turn error otherwise
    pub async fn ask(&self, user_input: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("turn")?)
            .json(&TurnRequest {
                user_id: &self.user_id,
                user_input,
            })
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        let body: TurnResponse = response.json().await.map_err(transport)?;
        Ok(body.response)
    }

    /// Synthesize speech on the server, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or synthesis fails
    pub async fn text_to_speech(&self, text: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.endpoint("text-to-speech")?)
            .json(&SpeechRequest { text })
            .send()
            .await
            .map_err(transport)?;

        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    /// Fetch a user's stored interactions, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or storage is unavailable
    pub async fn interactions(&self, user_id: &str) -> Result<Vec<Interaction>> {
        let mut url = self.endpoint("interactions/")?;
        url.path_segments_mut()
            .map_err(|()| Error::Config("server URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(user_id);

        let response = self.client.get(url).send().await.map_err(transport)?;
        let response = check_status(response).await?;
        let body: InteractionsResponse = response.json().await.map_err(transport)?;
        Ok(body.interactions)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint {path}: {e}")))
    }
}

#[async_trait]
impl TurnClient for ApiClient {
    async fn send_turn(&self, user_input: &str) -> Result<String> {
        self.ask(user_input).await
    }
}

fn transport(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}

/// Map a non-success response onto the error it reports
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let Ok(body) = serde_json::from_str::<ErrorBody>(&text) else {
        return Err(Error::Transport(format!("server returned {status}: {text}")));
    };

    Err(error_from_code(&body.error.code, body.error.message))
}

fn error_from_code(code: &str, message: String) -> Error {
    match code {
        "model_unavailable" => Error::ModelUnavailable,
        "empty_response" => Error::EmptyResponse,
        "model_error" => Error::Model(message),
        "not_configured" | "synthesis_failed" => Error::Tts(message),
        "storage_unavailable" | "storage_error" => Error::StorageUnavailable(message),
        _ => Error::Transport(format!("{code}: {message}")),
    }
}
