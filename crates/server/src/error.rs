use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use eval_oracle::OracleError;
use serde_json::json;

use crate::tracker::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl From<LinkError> for AppError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::EmptyName | LinkError::MalformedGameId(_) => {
                AppError::BadRequest(err.to_string())
            }
            LinkError::Duplicate { .. } => AppError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Oracle(e) => {
                tracing::warn!("Evaluation failed: {e}");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
