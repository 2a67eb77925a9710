use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;

use crate::Evaluation;

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Evaluations keyed by exact FEN string, least-recently-used eviction.
pub struct EvalCache {
    memory: Mutex<LruCache<String, Evaluation>>,
}

impl EvalCache {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// A hit refreshes the entry's recency.
    pub fn get(&self, fen: &str) -> Option<Evaluation> {
        self.lock().get(fen).cloned()
    }

    pub fn put(&self, fen: &str, evaluation: Evaluation) {
        self.lock().put(fen.to_string(), evaluation);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Evaluation>> {
        match self.memory.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for EvalCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
