use async_trait::async_trait;

use crate::error::OracleError;
use crate::{Evaluation, ProgressFn};

/// A source of evaluations. Implemented by the remote scoring service and the
/// local engine; tests plug in their own.
#[async_trait]
pub trait EvalBackend: Send + Sync {
    /// Evaluate a FEN that already passed structural validation.
    ///
    /// `Ok(None)` means the backend produced nothing usable in time.
    async fn evaluate(
        &self,
        fen: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Option<Evaluation>, OracleError>;

    /// Abort the search in progress, if the backend has one.
    async fn stop(&self) {}

    /// Release long-lived resources (engine processes).
    async fn shutdown(&self) {}

    fn name(&self) -> &'static str;
}
