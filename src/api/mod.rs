//! HTTP API server for the assistant

pub mod health;
pub mod interactions;
pub mod turn;
pub mod voice;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::conversation::TurnHandler;
use crate::voice::SpeechSynthesizer;
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub turns: TurnHandler,
    /// Present when a TTS provider is configured
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

impl ApiState {
    #[must_use]
    pub fn new(turns: TurnHandler) -> Self {
        Self {
            turns,
            synthesizer: None,
        }
    }

    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        self.synthesizer = synthesizer;
        self
    }
}

/// Build the router with all routes, without middleware
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(turn::router(state.clone()))
        .merge(voice::router(state.clone()))
        .merge(interactions::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state))
}

/// JSON error envelope shared by all endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

pub(crate) fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody { code, message },
        }),
    )
        .into_response()
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    state: ApiState,
    host: String,
    port: u16,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(turns: TurnHandler) -> Self {
        Self {
            state: ApiState::new(turns),
            host: "127.0.0.1".to_string(),
            port: crate::config::DEFAULT_PORT,
        }
    }

    /// Set the speech synthesizer backing `/text-to-speech`
    #[must_use]
    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.state.synthesizer = Some(synthesizer);
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(self.state),
            host: self.host,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes and middleware
    #[must_use]
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if !self.state.turns.has_model() {
            tracing::warn!("no language model loaded, turns will fail until restart");
        }
        if self.state.turns.store().is_none() {
            tracing::warn!("interaction store unavailable, running without history");
        }

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(addr = %addr, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
