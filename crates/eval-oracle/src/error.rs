//! Oracle error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Evaluation service returned HTTP {0}")]
    Status(u16),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Engine process exited unexpectedly")]
    EngineCrashed,

    #[error("No engine could be started: {0}")]
    EngineUnavailable(String),

    #[error("Engine queue is closed")]
    QueueClosed,
}
