pub mod evaluate;
pub mod events;
pub mod games;
pub mod health;
pub mod links;
pub mod round;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Extension, Router,
};
use eval_oracle::EvalOracle;
use tower_http::cors::{Any, CorsLayer};

use crate::feed::RoundFeed;
use crate::tracker::LinkTracker;

/// Every route of the overlay API, with shared state attached.
pub fn router(tracker: Arc<LinkTracker>, feed: Arc<RoundFeed>, oracle: EvalOracle) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        // Links
        .route("/api/links", get(links::list_links).post(links::add_links))
        .route("/api/links/{index}", delete(links::remove_link))
        // Round
        .route("/api/round", post(round::select_round).delete(round::stop_round))
        .route("/api/games", get(games::list_games))
        // Evaluation
        .route("/api/evaluate", post(evaluate::evaluate))
        .route("/api/events", get(events::ws_handler))
        .layer(Extension(tracker))
        .layer(Extension(feed))
        .layer(Extension(oracle))
        .layer(cors)
}
