//! Position evaluation behind one interface: a remote scoring service or a
//! local UCI engine, with FEN validation and an LRU result cache in front.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fen;
pub mod local;
pub mod oracle;
pub mod remote;

pub use backend::EvalBackend;
pub use config::OracleConfig;
pub use error::OracleError;
pub use oracle::EvalOracle;

/// Score magnitude used for any forced mate.
pub const MATE_SCORE: f64 = 100.0;

/// Result of evaluating one position, always from White's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Pawns; `±MATE_SCORE` when a mate was found.
    pub evaluation: f64,
    /// Search depth reached (0 when the backend does not report one).
    pub depth: u32,
    /// Signed mate distance from White's point of view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mate_in: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_move: Option<String>,
}

/// Intermediate result reported while a search deepens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub evaluation: f64,
    pub depth: u32,
}

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;
