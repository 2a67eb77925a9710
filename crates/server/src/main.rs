use std::sync::Arc;

use anyhow::Context;
use eval_oracle::{EvalOracle, OracleConfig};
use evalbars_server::clients::lichess::LichessClient;
use evalbars_server::config::Config;
use evalbars_server::feed::RoundFeed;
use evalbars_server::routes;
use evalbars_server::tracker::LinkTracker;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    let oracle_config = OracleConfig::from_env().context("Invalid evaluator configuration")?;

    let oracle = EvalOracle::from_config(&oracle_config).context("Failed to set up evaluator")?;
    tracing::info!("Evaluator: {}", oracle.backend_name());

    let client = LichessClient::new(&config.lichess_base_url).context("Failed to build HTTP client")?;
    let feed = Arc::new(RoundFeed::new(client, config.fallback_poll));
    let tracker = Arc::new(LinkTracker::new(config.blunder));

    // Pre-seeded round and games
    if !config.game_ids.is_empty() {
        tracker
            .add_game_ids(&config.game_ids)
            .context("Invalid GAME_IDS")?;
    }
    if let Some(round_id) = &config.round_id {
        feed.start(round_id);
    }

    let shutdown = CancellationToken::new();

    // Tracker cycle
    let cycle = tokio::spawn({
        let tracker = tracker.clone();
        let feed = feed.clone();
        let oracle = oracle.clone();
        let shutdown = shutdown.clone();
        let (every, link_delay) = (config.poll_interval, config.link_delay);
        async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if tracker.is_empty() {
                    continue;
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    updated = tracker.run_cycle(feed.as_ref(), &oracle, link_delay) => {
                        if updated > 0 {
                            tracing::debug!("Updated {updated} links");
                        }
                    }
                }
            }
        }
    });

    let app = routes::router(tracker, feed.clone(), oracle.clone());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    feed.stop();
    oracle.shutdown().await;
    cycle.await.ok();
    Ok(())
}
