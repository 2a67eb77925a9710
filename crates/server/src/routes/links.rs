use std::sync::Arc;

use axum::{extract::Path, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::error::AppError;
use crate::tracker::{LinkTracker, TrackedLink};

#[derive(Deserialize)]
#[serde(untagged)]
pub enum AddLinksRequest {
    #[serde(rename_all = "camelCase")]
    Pair {
        white_player: String,
        black_player: String,
    },
    #[serde(rename_all = "camelCase")]
    GameIds { game_ids: Vec<String> },
}

/// GET /api/links
pub async fn list_links(Extension(tracker): Extension<Arc<LinkTracker>>) -> Json<Vec<TrackedLink>> {
    Json(tracker.snapshot())
}

/// POST /api/links
pub async fn add_links(
    Extension(tracker): Extension<Arc<LinkTracker>>,
    Json(req): Json<AddLinksRequest>,
) -> Result<Json<JsonValue>, AppError> {
    let added = match req {
        AddLinksRequest::Pair {
            white_player,
            black_player,
        } => vec![tracker.add_link(&white_player, &black_player)?],
        AddLinksRequest::GameIds { game_ids } => tracker.add_game_ids(&game_ids)?,
    };

    Ok(Json(json!({
        "added": added,
        "links": tracker.snapshot(),
    })))
}

/// DELETE /api/links/{index}
pub async fn remove_link(
    Extension(tracker): Extension<Arc<LinkTracker>>,
    Path(index): Path<usize>,
) -> Result<Json<TrackedLink>, AppError> {
    tracker
        .remove_link(index)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No link at index {index}")))
}
