use std::env;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::engine::{EngineOptions, EngineSpec, SearchLimits};
use crate::error::OracleError;
use crate::remote::RemoteMode;

pub const DEFAULT_ENDPOINT: &str = "https://stockfish.chessfolio.fun/analyze_stockfish";

/// Engine searches always get between 8 and 15 seconds.
const MIN_ENGINE_TIMEOUT_SECS: u64 = 8;
const MAX_ENGINE_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Debug)]
pub enum BackendKind {
    Remote { endpoint: String, mode: RemoteMode },
    Local { engines: Vec<EngineSpec> },
}

#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub backend: BackendKind,
    pub http_timeout: Duration,
    pub engine_options: EngineOptions,
    pub limits: SearchLimits,
    pub cooldown: Duration,
    pub cache_size: usize,
}

impl OracleConfig {
    pub fn from_env() -> Result<Self, OracleError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self, OracleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| -> u64 {
            var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        };

        let backend = match var("EVAL_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("remote") => {
                let mode = match var("EVAL_REMOTE_MODE").as_deref().map(str::trim) {
                    None | Some("") | Some("json") => RemoteMode::JsonBody,
                    Some("query") => RemoteMode::QueryParam,
                    Some(other) => {
                        return Err(OracleError::Config(format!(
                            "EVAL_REMOTE_MODE must be 'json' or 'query', got '{other}'"
                        )))
                    }
                };
                BackendKind::Remote {
                    endpoint: var("EVAL_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                    mode,
                }
            }
            Some("local") => {
                let mut engines = vec![EngineSpec::new(
                    var("STOCKFISH_PATH").unwrap_or_else(|| "/usr/local/bin/stockfish".to_string()),
                )];
                if let Some(fallback) = var("STOCKFISH_FALLBACK_PATH").filter(|p| !p.is_empty()) {
                    engines.push(EngineSpec::new(fallback));
                }
                BackendKind::Local { engines }
            }
            Some(other) => {
                return Err(OracleError::Config(format!(
                    "EVAL_BACKEND must be 'remote' or 'local', got '{other}'"
                )))
            }
        };

        let timeout_secs = number("ENGINE_TIMEOUT_SECS", 10)
            .clamp(MIN_ENGINE_TIMEOUT_SECS, MAX_ENGINE_TIMEOUT_SECS);

        Ok(Self {
            backend,
            http_timeout: Duration::from_secs(number("EVAL_HTTP_TIMEOUT_SECS", 20)),
            engine_options: EngineOptions {
                threads: number("ENGINE_THREADS", 1).max(1) as u32,
                hash_mb: number("ENGINE_HASH_MB", 16).max(1) as u32,
                init_timeout: Duration::from_secs(number("ENGINE_INIT_TIMEOUT_SECS", 30)),
            },
            limits: SearchLimits {
                max_depth: number("ENGINE_MAX_DEPTH", 18).max(1) as u32,
                timeout: Duration::from_secs(timeout_secs),
            },
            cooldown: Duration::from_millis(number("ENGINE_COOLDOWN_MS", 50)),
            cache_size: (number("EVAL_CACHE_SIZE", DEFAULT_CACHE_CAPACITY as u64) as usize).max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<OracleConfig, OracleError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OracleConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        match c.backend {
            BackendKind::Remote { endpoint, mode } => {
                assert_eq!(endpoint, DEFAULT_ENDPOINT);
                assert_eq!(mode, RemoteMode::JsonBody);
            }
            other => panic!("expected remote backend, got {other:?}"),
        }
        assert_eq!(c.limits.max_depth, 18);
        assert_eq!(c.limits.timeout, Duration::from_secs(10));
        assert_eq!(c.cache_size, 100);
    }

    #[test]
    fn test_local_with_fallback() {
        let c = config(&[
            ("EVAL_BACKEND", "local"),
            ("STOCKFISH_PATH", "/opt/sf"),
            ("STOCKFISH_FALLBACK_PATH", "/opt/sf-lite"),
        ])
        .unwrap();
        match c.backend {
            BackendKind::Local { engines } => {
                assert_eq!(engines, vec![EngineSpec::new("/opt/sf"), EngineSpec::new("/opt/sf-lite")]);
            }
            other => panic!("expected local backend, got {other:?}"),
        }
    }

    #[test]
    fn test_engine_timeout_is_clamped() {
        let low = config(&[("ENGINE_TIMEOUT_SECS", "2")]).unwrap();
        assert_eq!(low.limits.timeout, Duration::from_secs(8));
        let high = config(&[("ENGINE_TIMEOUT_SECS", "60")]).unwrap();
        assert_eq!(high.limits.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(matches!(
            config(&[("EVAL_BACKEND", "cloud")]),
            Err(OracleError::Config(_))
        ));
        assert!(matches!(
            config(&[("EVAL_REMOTE_MODE", "form")]),
            Err(OracleError::Config(_))
        ));
    }

    #[test]
    fn test_zero_cache_size_becomes_one() {
        assert_eq!(config(&[("EVAL_CACHE_SIZE", "0")]).unwrap().cache_size, 1);
    }
}
