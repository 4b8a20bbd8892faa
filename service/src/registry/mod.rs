//! Predictor-builder registry and trained-predictor cache
//!
//! Both are explicit objects owned by a composer instance, so independent
//! composers in the same process never share builders or predictors.

pub mod cache;

pub use cache::PredictorCache;

use composer_core::{ComposerError, PredictorBuilder, Result, casefold};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Registry of foreign predictor builders keyed by case-folded name
///
/// Written rarely (at startup), read on every parse, initialization and
/// cache miss.
#[derive(Default)]
pub struct PredictorRegistry {
    builders: RwLock<IndexMap<String, Arc<dyn PredictorBuilder>>>,
}

impl PredictorRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder under its own name
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::DuplicateBuilderName` if the name is taken
    pub fn register(&self, builder: Arc<dyn PredictorBuilder>) -> Result<()> {
        let name = casefold(builder.name());
        if name.is_empty() {
            return Err(ComposerError::invalid("Predictor builder name is empty"));
        }

        let mut builders = self.builders.write();
        if builders.contains_key(&name) {
            return Err(ComposerError::DuplicateBuilderName(name));
        }
        builders.insert(name.clone(), builder);
        info!(builder = %name, "registered foreign predictor builder");
        Ok(())
    }

    /// Look up a builder by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn PredictorBuilder>> {
        self.builders.read().get(&casefold(name)).map(Arc::clone)
    }

    /// Look up a builder for a column's persisted assignment
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::UnregisteredPredictor` if no builder has the name
    pub fn require(&self, name: &str, column: &str) -> Result<Arc<dyn PredictorBuilder>> {
        self.get(name)
            .ok_or_else(|| ComposerError::unregistered(name, column))
    }

    /// Whether a builder is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.builders.read().contains_key(&casefold(name))
    }

    /// Registered names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.builders.read().keys().cloned().collect()
    }

    /// Number of registered builders
    #[must_use]
    pub fn len(&self) -> usize {
        self.builders.read().len()
    }

    /// Whether no builder is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builders.read().is_empty()
    }
}

impl std::fmt::Debug for PredictorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictorRegistry")
            .field("builders", &self.names())
            .finish()
    }
}
