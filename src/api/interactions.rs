//! Stored interaction history endpoint

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::{ApiState, error_response};
use crate::db::Interaction;

/// Build interactions router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/interactions/{user_id}", get(list_interactions))
        .with_state(state)
}

/// All of a user's interactions, oldest first
#[derive(Debug, Serialize)]
pub struct InteractionsResponse {
    pub user_id: String,
    pub interactions: Vec<Interaction>,
}

async fn list_interactions(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
) -> Result<Json<InteractionsResponse>, HistoryError> {
    let store = state.turns.store().cloned().ok_or(HistoryError::Unavailable)?;

    let lookup_id = user_id.clone();
    let interactions = tokio::task::spawn_blocking(move || store.find_all(&lookup_id))
        .await
        .map_err(|e| HistoryError::Failed(e.to_string()))?
        .map_err(|e| HistoryError::Failed(e.to_string()))?;

    Ok(Json(InteractionsResponse {
        user_id,
        interactions,
    }))
}

#[derive(Debug)]
pub enum HistoryError {
    Unavailable,
    Failed(String),
}

impl IntoResponse for HistoryError {
    fn into_response(self) -> Response {
        match self {
            Self::Unavailable => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "storage_unavailable",
                "interaction store not configured".to_string(),
            ),
            Self::Failed(msg) => {
                tracing::error!(error = %msg, "interaction lookup failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
            }
        }
    }
}
