//! Collaborators shared by the lifecycle manager and the inference engine

use crate::model::CompositeModel;
use crate::registry::{PredictorCache, PredictorRegistry};
use crate::store::CompositeStore;
use composer_core::{
    BaseModel, ColNo, ComposerConfig, ComposerError, ConfidenceEstimator, ModelId, Predictor,
    Result, Table, casefold,
};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Everything a composer instance owns
pub struct ComposerContext {
    pub(crate) base: Arc<dyn BaseModel>,
    pub(crate) store: Arc<dyn CompositeStore>,
    pub(crate) registry: Arc<PredictorRegistry>,
    pub(crate) cache: PredictorCache,
    pub(crate) config: ComposerConfig,
    pub(crate) estimator: Arc<dyn ConfidenceEstimator>,
    tables: RwLock<HashMap<String, Arc<Table>>>,
    rng: Mutex<StdRng>,
}

impl ComposerContext {
    #[must_use]
    pub fn new(
        base: Arc<dyn BaseModel>,
        store: Arc<dyn CompositeStore>,
        registry: Arc<PredictorRegistry>,
        estimator: Arc<dyn ConfidenceEstimator>,
        config: ComposerConfig,
    ) -> Self {
        let rng = match config.sampling.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            base,
            store,
            registry,
            cache: PredictorCache::new(),
            config,
            estimator,
            tables: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PredictorRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn cache(&self) -> &PredictorCache {
        &self.cache
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CompositeStore> {
        &self.store
    }

    /// Make a table available to model creation and imputation
    pub fn register_table(&self, table: Table) {
        debug!(table = %table.name(), rows = table.len(), "registered table");
        self.tables
            .write()
            .insert(table.name().to_string(), Arc::new(table));
    }

    /// Look up a registered table
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::TableNotFound` if no table has the name
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        let name = casefold(name);
        self.tables
            .read()
            .get(&name)
            .cloned()
            .ok_or(ComposerError::TableNotFound(name))
    }

    /// Current view of a composite model
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotFound` if the model does not exist
    pub fn model(&self, id: ModelId) -> Result<CompositeModel> {
        let snapshot = self.store.snapshot()?;
        CompositeModel::load(&snapshot, id, self.base.as_ref())
    }

    /// Trained predictor of a foreign column, deserialized on first use
    ///
    /// A view taken before the model was dropped never repopulates the cache:
    /// the model must still exist in the store when the entry is filled.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::UnregisteredPredictor` if the persisted builder
    /// is not registered, `ComposerError::ModelNotInitialized` if the
    /// predictor has not been trained and `ComposerError::ModelNotFound` if
    /// the model was dropped
    pub fn predictor(&self, model: &CompositeModel, colno: ColNo) -> Result<Arc<dyn Predictor>> {
        let record = model.assignment(colno).ok_or_else(|| {
            ComposerError::invalid(format!(
                "Column {colno} of model {} has no foreign predictor",
                model.name
            ))
        })?;
        self.cache.get_or_load(model.id, colno, || {
            // Checked under the entry lock, which eviction also takes
            self.store.snapshot()?.model(model.id)?;
            let builder = self
                .registry
                .require(&record.builder, model.column_name(colno)?)?;
            let bytes = record
                .trained
                .as_ref()
                .ok_or_else(|| ComposerError::ModelNotInitialized(model.name.clone()))?;
            builder.deserialize(bytes)
        })
    }

    /// Derive an independent random stream from the master stream
    pub(crate) fn fork_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.rng.lock().next_u64())
    }
}

impl std::fmt::Debug for ComposerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposerContext")
            .field("registry", &self.registry)
            .field("cached_predictors", &self.cache.len())
            .field("tables", &self.tables.read().keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
