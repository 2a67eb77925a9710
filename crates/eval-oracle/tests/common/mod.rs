#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use eval_oracle::engine::{EngineOptions, EngineSpec, SearchLimits};
use eval_oracle::local::LocalEngineSettings;

pub const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

/// The scripted engine in `tests/fixtures`, run through `sh`.
pub fn fake_engine(args: &[&str]) -> EngineSpec {
    let script = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("fake_uci.sh");
    let mut all = vec![script.to_string_lossy().into_owned()];
    all.extend(args.iter().map(|a| a.to_string()));
    EngineSpec::new("sh").with_args(all)
}

pub fn settings(engines: Vec<EngineSpec>, timeout: Duration) -> LocalEngineSettings {
    LocalEngineSettings {
        engines,
        options: EngineOptions {
            threads: 1,
            hash_mb: 16,
            init_timeout: Duration::from_secs(5),
        },
        limits: SearchLimits {
            max_depth: 18,
            timeout,
        },
        cooldown: Duration::from_millis(10),
    }
}

/// Unique scratch path under the system temp dir.
pub fn marker_path(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("{name}-{}-{nanos}", std::process::id()))
}
