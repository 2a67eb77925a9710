//! Replay error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Invalid FEN header: {0}")]
    InvalidStartFen(String),

    #[error("Illegal starting position: {0}")]
    IllegalStartPosition(String),
}
