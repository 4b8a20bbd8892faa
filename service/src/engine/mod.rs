//! Composite inference engine
//!
//! Answers probabilistic queries over a composite model. Queries touching
//! only local columns are delegated to the base model; everything else runs
//! through the sampling-importance-resampling machinery in [`sampler`].
//!
//! Every query takes a replicate selector. `Some(r)` evaluates replicate `r`
//! only; `None` evaluates every replicate and averages the answers.

mod density;
mod dependence;
mod imputation;
mod mutual_info;
pub mod sampler;

use crate::context::ComposerContext;
use crate::model::CompositeModel;
use composer_core::{ColNo, ComposerError, ModelId, Result, RowId};
use rand::RngCore;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Query engine over the composite models of one composer
pub struct InferenceEngine {
    ctx: Arc<ComposerContext>,
    /// Present when replicates are evaluated in parallel
    pool: Option<rayon::ThreadPool>,
}

impl InferenceEngine {
    /// Create an engine over a shared context
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ConfigError` if the worker pool cannot be built
    pub fn new(ctx: Arc<ComposerContext>) -> Result<Self> {
        let sampling = &ctx.config().sampling;
        let pool = if sampling.parallel && sampling.threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(sampling.threads)
                .build()
                .map_err(|e| ComposerError::config(format!("Failed to create thread pool: {e}")))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self { ctx, pool })
    }

    #[must_use]
    pub fn context(&self) -> &Arc<ComposerContext> {
        &self.ctx
    }

    /// Column number of a column name in a composite model
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotFound` or `ComposerError::ColumnNotFound`
    pub fn column_number(&self, model: ModelId, name: &str) -> Result<ColNo> {
        self.ctx.model(model)?.column_number(name)
    }

    /// Similarity of two rows, computed by the base model over the local
    /// subset of `columns`
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::InvalidArgument` if `columns` names no local
    /// column, or the base model's error
    pub fn row_similarity(
        &self,
        model: ModelId,
        replicate: Option<usize>,
        rowid: RowId,
        other: RowId,
        columns: &[ColNo],
    ) -> Result<f64> {
        let model = self.ctx.model(model)?;
        model.check_columns(columns.iter().copied())?;
        model.select_replicates(replicate)?;

        let local: Vec<ColNo> = columns
            .iter()
            .copied()
            .filter(|c| model.graph().is_local(*c))
            .collect();
        if local.is_empty() {
            return Err(ComposerError::invalid(
                "row similarity needs at least one local column",
            ));
        }
        if local.len() < columns.len() {
            debug!(
                model = %model.id,
                dropped = columns.len() - local.len(),
                "ignoring foreign columns in row similarity"
            );
        }

        self.ctx.base.row_similarity(
            model.base,
            replicate,
            rowid,
            other,
            &model.to_base_columns(&local)?,
        )
    }

    /// Cap a requested sample count at `sampling.max_samples`
    fn clamp_samples(&self, requested: usize) -> Result<usize> {
        if requested == 0 {
            return Err(ComposerError::invalid("sample count must be positive"));
        }
        let max = self.ctx.config().sampling.max_samples;
        if requested > max {
            warn!(requested, max, "clamping sample count");
            Ok(max)
        } else {
            Ok(requested)
        }
    }

    /// Sample count for density estimates
    fn density_samples(&self, requested: Option<usize>) -> Result<usize> {
        self.clamp_samples(requested.unwrap_or(self.ctx.config().sampling.n_samples))
    }

    /// Evaluate `f` once per replicate, each call on its own random stream
    ///
    /// Streams are derived from the master stream before dispatch, so the
    /// results do not depend on how the pool schedules the calls.
    fn per_replicate<T, F>(
        &self,
        model: &CompositeModel,
        replicates: &[usize],
        f: F,
    ) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&CompositeModel, usize, &mut dyn RngCore) -> Result<T> + Sync,
    {
        let streams: Vec<StdRng> = replicates.iter().map(|_| self.ctx.fork_rng()).collect();
        let jobs = replicates.iter().copied().zip(streams);

        match &self.pool {
            Some(pool) if replicates.len() > 1 => pool.install(|| {
                jobs.collect::<Vec<_>>()
                    .into_par_iter()
                    .map(|(r, mut rng)| f(model, r, &mut rng))
                    .collect()
            }),
            _ => jobs.map(|(r, mut rng)| f(model, r, &mut rng)).collect(),
        }
    }
}
