//! Composer facade wiring the collaborators together

use crate::context::ComposerContext;
use crate::engine::InferenceEngine;
use crate::lifecycle::ModelLifecycle;
use crate::registry::PredictorRegistry;
use crate::stats::GaussianMixtureConfidence;
use crate::store::{CompositeStore, InMemoryStore};
use composer_core::{
    BaseModel, ComposerConfig, ConfidenceEstimator, PredictorBuilder, Result, Table,
};
use std::sync::Arc;
use tracing::info;

/// One composer instance: a base model, its foreign predictors, the store
/// holding composite model records, and the engine answering queries
pub struct Composer {
    ctx: Arc<ComposerContext>,
    lifecycle: ModelLifecycle,
    engine: InferenceEngine,
}

impl Composer {
    /// Create a composer with an in-memory store and the default confidence
    /// estimator
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ConfigError` if the configuration is invalid
    pub fn new(base: Arc<dyn BaseModel>, config: ComposerConfig) -> Result<Self> {
        ComposerBuilder::new(base).config(config).build()
    }

    #[must_use]
    pub fn builder(base: Arc<dyn BaseModel>) -> ComposerBuilder {
        ComposerBuilder::new(base)
    }

    /// Register a foreign predictor builder
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::DuplicateBuilderName` if the name is taken
    pub fn register_predictor(&self, builder: Arc<dyn PredictorBuilder>) -> Result<()> {
        self.ctx.registry().register(builder)
    }

    /// Make a table available for model creation and imputation
    pub fn register_table(&self, table: Table) {
        self.ctx.register_table(table);
    }

    #[must_use]
    pub fn lifecycle(&self) -> &ModelLifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    #[must_use]
    pub fn context(&self) -> &Arc<ComposerContext> {
        &self.ctx
    }
}

/// Builder for [`Composer`] with optional collaborators
pub struct ComposerBuilder {
    base: Arc<dyn BaseModel>,
    config: ComposerConfig,
    store: Option<Arc<dyn CompositeStore>>,
    registry: Option<Arc<PredictorRegistry>>,
    estimator: Option<Arc<dyn ConfidenceEstimator>>,
}

impl ComposerBuilder {
    #[must_use]
    pub fn new(base: Arc<dyn BaseModel>) -> Self {
        Self {
            base,
            config: ComposerConfig::default(),
            store: None,
            registry: None,
            estimator: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: ComposerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn CompositeStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share a registry with other composers
    #[must_use]
    pub fn registry(mut self, registry: Arc<PredictorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn estimator(mut self, estimator: Arc<dyn ConfidenceEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Validate the configuration and assemble the composer
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ConfigError` if the configuration is invalid or
    /// the worker pool cannot be created
    pub fn build(self) -> Result<Composer> {
        self.config.validate()?;
        let estimator: Arc<dyn ConfidenceEstimator> = match self.estimator {
            Some(estimator) => estimator,
            None => Arc::new(GaussianMixtureConfidence::from_config(
                &self.config.imputation,
            )),
        };
        let store: Arc<dyn CompositeStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStore::new()),
        };
        let registry = self.registry.unwrap_or_default();

        info!(
            n_samples = self.config.sampling.n_samples,
            parallel = self.config.sampling.parallel,
            seeded = self.config.sampling.seed.is_some(),
            "creating composer"
        );

        let ctx = Arc::new(ComposerContext::new(
            self.base,
            store,
            registry,
            estimator,
            self.config,
        ));
        Ok(Composer {
            lifecycle: ModelLifecycle::new(Arc::clone(&ctx)),
            engine: InferenceEngine::new(Arc::clone(&ctx))?,
            ctx,
        })
    }
}
