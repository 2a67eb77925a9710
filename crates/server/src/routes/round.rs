use std::sync::Arc;

use axum::{Extension, Json};
use eval_oracle::EvalOracle;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::time::Instant;

use crate::error::AppError;
use crate::feed::RoundFeed;
use crate::tracker::{parse_game_id, LinkTracker};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRoundRequest {
    pub round_id: String,
    /// When given, replaces the tracked links.
    pub game_ids: Option<Vec<String>>,
}

/// POST /api/round
///
/// Switch to another broadcast round: the old stream is aborted, its buffer
/// dropped, and every link starts over.
pub async fn select_round(
    Extension(tracker): Extension<Arc<LinkTracker>>,
    Extension(feed): Extension<Arc<RoundFeed>>,
    Extension(oracle): Extension<EvalOracle>,
    Json(req): Json<SelectRoundRequest>,
) -> Result<Json<JsonValue>, AppError> {
    let round_id = req.round_id.trim();
    if round_id.is_empty() || !round_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest(format!("Invalid round id '{round_id}'")));
    }

    if let Some(ids) = &req.game_ids {
        for id in ids {
            parse_game_id(id)?;
        }
        tracker.clear();
        tracker.add_game_ids(ids)?;
    }

    // a search for the old round is no longer wanted
    oracle.stop().await;
    feed.start(round_id);
    tracker.reset_round(Instant::now());

    Ok(Json(json!({
        "roundId": round_id,
        "links": tracker.snapshot(),
    })))
}

/// DELETE /api/round
pub async fn stop_round(
    Extension(tracker): Extension<Arc<LinkTracker>>,
    Extension(feed): Extension<Arc<RoundFeed>>,
) -> Json<JsonValue> {
    feed.stop();
    tracker.reset_round(Instant::now());
    Json(json!({ "roundId": null }))
}
