use std::sync::Arc;

use axum::{Extension, Json};

use crate::feed::{FeedSnapshot, RoundFeed};

/// GET /api/games
///
/// Pairings seen so far in the followed round, for picking games to track.
pub async fn list_games(Extension(feed): Extension<Arc<RoundFeed>>) -> Json<FeedSnapshot> {
    Json(feed.snapshot())
}
