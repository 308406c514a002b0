//! Conversation turn endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{ApiState, error_response};
use crate::Error;

/// Build turn router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/turn", post(turn))
        .with_state(state)
}

/// Turn request
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub user_id: String,
    pub user_input: String,
}

/// Turn response
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub response: String,
}

async fn turn(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, TurnError> {
    tracing::info!(user_id = %request.user_id, "turn request");

    let response = state
        .turns
        .handle_turn(&request.user_id, &request.user_input)
        .await
        .map_err(TurnError)?;

    Ok(Json(TurnResponse { response }))
}

/// A failed turn, rendered as a JSON error
#[derive(Debug)]
pub struct TurnError(pub Error);

impl IntoResponse for TurnError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            Error::ModelUnavailable => "model_unavailable",
            Error::EmptyResponse => "empty_response",
            _ => "model_error",
        };

        tracing::error!(code, error = %self.0, "turn failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, code, self.0.to_string())
    }
}
