//! Encoding cache
//!
//! Memoizes state encodings across repeated checks on the same state. The
//! cache owns the `ExprContext` its entries were built in, so every solver
//! sharing a cache encodes into that context.

use crate::config::CacheConfig;
use crate::features::predicate_state::PredicateState;
use crate::features::smt::domain::expr::{ExprContext, ExprId};
use crate::features::smt::infrastructure::ContextSnapshot;
use crate::features::term_algebra::{PredicateId, TermId};
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// `(nest id, memory_start, memory_end, state)`
///
/// States hold nest-relative handles, so the owning nest is part of the key.
pub type CacheKey = (u64, u64, u64, PredicateState);

/// Everything later checks need from a state encoding
#[derive(Debug, Clone)]
pub struct EncodedState {
    /// State formula conjoined with the context axioms
    pub formula: ExprId,
    pub snapshot: ContextSnapshot,
    pub symbols: FxHashMap<ExprId, TermId>,
    pub predicates: Vec<(PredicateId, ExprId)>,
}

pub struct EncodingCache {
    ctx: Arc<ExprContext>,
    entries: Mutex<LruCache<CacheKey, Arc<EncodedState>>>,
    hits: Mutex<(usize, usize)>,
}

impl EncodingCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ctx: Arc::new(ExprContext::new()),
            entries: Mutex::new(LruCache::new(capacity)),
            hits: Mutex::new((0, 0)),
        }
    }

    pub fn ctx(&self) -> Arc<ExprContext> {
        Arc::clone(&self.ctx)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<EncodedState>> {
        let found = self.entries.lock().get(key).cloned();
        let mut hits = self.hits.lock();
        match found {
            Some(_) => hits.0 += 1,
            None => hits.1 += 1,
        }
        found
    }

    pub fn put(&self, key: CacheKey, value: Arc<EncodedState>) {
        self.entries.lock().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        *self.hits.lock() = (0, 0);
    }

    /// Hit rate over every lookup so far (0.0-1.0)
    pub fn hit_rate(&self) -> f32 {
        let (hits, misses) = *self.hits.lock();
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f32 / total as f32
        }
    }
}

impl Default for EncodingCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
