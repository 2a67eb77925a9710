use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::EvalBackend;
use crate::cache::EvalCache;
use crate::config::{BackendKind, OracleConfig};
use crate::error::OracleError;
use crate::fen::validate_fen;
use crate::local::{LocalEngineBackend, LocalEngineSettings};
use crate::remote::RemoteBackend;
use crate::{Evaluation, ProgressFn};

/// The evaluation entry point the rest of the system talks to.
///
/// Callers never pick a backend; that is decided once from configuration.
#[derive(Clone)]
pub struct EvalOracle {
    backend: Arc<dyn EvalBackend>,
    cache: Arc<EvalCache>,
    /// Bumped on every `stop`; a search that saw it change is not cached.
    stops: Arc<AtomicU64>,
}

impl EvalOracle {
    pub fn new(backend: Arc<dyn EvalBackend>, cache_capacity: usize) -> Self {
        Self {
            backend,
            cache: Arc::new(EvalCache::new(cache_capacity)),
            stops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build the configured backend. The local backend spawns its worker task,
    /// so this must run inside a tokio runtime.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let backend: Arc<dyn EvalBackend> = match &config.backend {
            BackendKind::Remote { endpoint, mode } => {
                Arc::new(RemoteBackend::new(endpoint, *mode, config.http_timeout)?)
            }
            BackendKind::Local { engines } => {
                Arc::new(LocalEngineBackend::spawn(LocalEngineSettings {
                    engines: engines.clone(),
                    options: config.engine_options.clone(),
                    limits: config.limits,
                    cooldown: config.cooldown,
                }))
            }
        };
        Ok(Self::new(backend, config.cache_size))
    }

    /// Evaluate `fen` from White's point of view.
    ///
    /// A structurally invalid FEN yields `Ok(None)` without touching the
    /// backend. Cached results are returned as-is. A search cut short by
    /// `stop` is returned but not cached.
    pub async fn evaluate(
        &self,
        fen: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Option<Evaluation>, OracleError> {
        if let Err(problem) = validate_fen(fen) {
            warn!(fen, %problem, "rejecting invalid FEN");
            return Ok(None);
        }

        if let Some(hit) = self.cache.get(fen) {
            debug!(fen, "evaluation cache hit");
            return Ok(Some(hit));
        }

        let stops = self.stops.load(Ordering::SeqCst);
        let result = self.backend.evaluate(fen, progress).await?;
        if let Some(evaluation) = &result {
            if self.stops.load(Ordering::SeqCst) == stops {
                self.cache.put(fen, evaluation.clone());
            } else {
                debug!(fen, depth = evaluation.depth, "search was stopped, not caching");
            }
        }
        Ok(result)
    }

    /// Abort the search in progress; it resolves with its best result so far.
    pub async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.backend.stop().await;
    }

    pub async fn shutdown(&self) {
        self.backend.shutdown().await;
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
        empty: bool,
    }

    #[async_trait]
    impl EvalBackend for CountingBackend {
        async fn evaluate(
            &self,
            _fen: &str,
            _progress: Option<ProgressFn>,
        ) -> Result<Option<Evaluation>, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Ok(None);
            }
            Ok(Some(Evaluation {
                evaluation: 0.2 + n as f64,
                depth: 18,
                mate_in: None,
                best_move: Some("e2e4".into()),
            }))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let backend = Arc::new(CountingBackend::default());
        let oracle = EvalOracle::new(backend.clone(), 10);

        let first = oracle.evaluate(START, None).await.unwrap();
        let second = oracle.evaluate(START, None).await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(oracle.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_fen_never_reaches_backend() {
        let backend = Arc::new(CountingBackend::default());
        let oracle = EvalOracle::new(backend.clone(), 10);

        for fen in [
            "",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq -",
            "rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq -",
        ] {
            assert_eq!(oracle.evaluate(fen, None).await.unwrap(), None);
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_cached() {
        let backend = Arc::new(CountingBackend {
            empty: true,
            ..Default::default()
        });
        let oracle = EvalOracle::new(backend.clone(), 10);

        assert_eq!(oracle.evaluate(START, None).await.unwrap(), None);
        assert_eq!(oracle.evaluate(START, None).await.unwrap(), None);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(oracle.cache_len(), 0);
    }

    /// Holds its first search open until stopped, then answers shallow.
    #[derive(Default)]
    struct HaltingBackend {
        calls: AtomicUsize,
        halted: Notify,
    }

    #[async_trait]
    impl EvalBackend for HaltingBackend {
        async fn evaluate(
            &self,
            _fen: &str,
            _progress: Option<ProgressFn>,
        ) -> Result<Option<Evaluation>, OracleError> {
            let depth = if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.halted.notified().await;
                1
            } else {
                18
            };
            Ok(Some(Evaluation {
                evaluation: 0.3,
                depth,
                mate_in: None,
                best_move: None,
            }))
        }

        async fn stop(&self) {
            self.halted.notify_one();
        }

        fn name(&self) -> &'static str {
            "halting"
        }
    }

    #[tokio::test]
    async fn test_stopped_search_is_not_cached() {
        let backend = Arc::new(HaltingBackend::default());
        let oracle = EvalOracle::new(backend.clone(), 10);

        let searching = oracle.clone();
        let handle = tokio::spawn(async move { searching.evaluate(START, None).await });
        while backend.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        oracle.stop().await;

        let shallow = handle.await.unwrap().unwrap().unwrap();
        assert_eq!(shallow.depth, 1);
        assert_eq!(oracle.cache_len(), 0);

        let full = oracle.evaluate(START, None).await.unwrap().unwrap();
        assert_eq!(full.depth, 18);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(oracle.cache_len(), 1);
    }
}
