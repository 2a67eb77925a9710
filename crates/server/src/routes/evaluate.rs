use axum::{Extension, Json};
use eval_oracle::{EvalOracle, Evaluation};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Deserialize)]
pub struct EvaluateRequest {
    pub fen: String,
}

/// POST /api/evaluate
///
/// `null` for a malformed FEN or when the evaluator had nothing to report.
pub async fn evaluate(
    Extension(oracle): Extension<EvalOracle>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<Option<Evaluation>>, AppError> {
    Ok(Json(oracle.evaluate(req.fen.trim(), None).await?))
}
