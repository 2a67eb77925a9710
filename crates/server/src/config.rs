use std::env;
use std::time::Duration;

use crate::tracker::BlunderSettings;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub lichess_base_url: String,
    /// Period of the tracker cycle.
    pub poll_interval: Duration,
    /// Pause between two links inside one cycle.
    pub link_delay: Duration,
    /// JSON polling period once the PGN stream is given up on.
    pub fallback_poll: Duration,
    pub blunder: BlunderSettings,
    /// Round to follow at startup.
    pub round_id: Option<String>,
    /// `<white>-vs-<black>` ids to track at startup, comma separated.
    pub game_ids: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| var(key).and_then(|v| v.trim().parse::<f64>().ok());
        let millis = |key: &str, default: u64| {
            Duration::from_millis(var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default))
        };
        let seconds = |key: &str, default: u64| {
            Duration::from_secs(var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default))
        };

        Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            lichess_base_url: var("LICHESS_BASE_URL")
                .unwrap_or_else(|| "https://lichess.org".to_string()),
            poll_interval: millis("POLL_INTERVAL_MS", 2000).max(Duration::from_millis(100)),
            link_delay: millis("LINK_DELAY_MS", 200),
            fallback_poll: seconds("FALLBACK_POLL_SECS", 5).max(Duration::from_secs(1)),
            blunder: BlunderSettings {
                band: parsed("BLUNDER_BAND").unwrap_or(4.0),
                threshold: parsed("BLUNDER_THRESHOLD").unwrap_or(2.0),
                cooldown: seconds("BLUNDER_COOLDOWN_SECS", 10),
                warmup: seconds("BLUNDER_WARMUP_SECS", 5),
            },
            round_id: var("ROUND_ID").filter(|v| !v.trim().is_empty()),
            game_ids: var("GAME_IDS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}
