//! Lazily populated cache of deserialized predictors
//!
//! Persisted bytes stay the source of truth; the cache only guarantees at
//! most one deserialization per `(model, column)` between evictions.

use composer_core::{ColNo, ModelId, Predictor, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::debug;

/// Cache of trained predictors keyed by `(model, column)`
#[derive(Default)]
pub struct PredictorCache {
    entries: DashMap<(ModelId, ColNo), Arc<dyn Predictor>>,
}

impl PredictorCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached predictor or load it with `load`
    ///
    /// The entry's shard stays locked while `load` runs, so concurrent
    /// callers for the same key wait instead of deserializing twice.
    ///
    /// # Errors
    ///
    /// Propagates the error from `load`; nothing is cached in that case
    pub fn get_or_load<F>(&self, model: ModelId, colno: ColNo, load: F) -> Result<Arc<dyn Predictor>>
    where
        F: FnOnce() -> Result<Box<dyn Predictor>>,
    {
        match self.entries.entry((model, colno)) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                debug!(model = %model, colno, "predictor cache miss");
                let predictor: Arc<dyn Predictor> = Arc::from(load()?);
                entry.insert(Arc::clone(&predictor));
                Ok(predictor)
            }
        }
    }

    /// Whether a predictor is cached
    #[must_use]
    pub fn contains(&self, model: ModelId, colno: ColNo) -> bool {
        self.entries.contains_key(&(model, colno))
    }

    /// Evict every predictor of a model, returning how many were dropped
    pub fn evict_model(&self, model: ModelId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(owner, _), _| *owner != model);
        let evicted = before.saturating_sub(self.entries.len());
        debug!(model = %model, evicted, "evicted cached predictors");
        evicted
    }

    /// Number of cached predictors
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
