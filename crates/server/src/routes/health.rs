use axum::{Extension, Json};
use eval_oracle::EvalOracle;
use serde_json::{json, Value as JsonValue};

/// GET /health
pub async fn health_check(Extension(oracle): Extension<EvalOracle>) -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "evaluator": oracle.backend_name(),
        "cachedEvaluations": oracle.cache_len(),
    }))
}
