//! Joint log density and column value probability

use super::InferenceEngine;
use super::sampler::pin_map;
use crate::model::CompositeModel;
use crate::stats::logmeanexp;
use composer_core::{ColNo, ComposerError, ModelId, Pin, Result, Value};
use rand::RngCore;
use tracing::trace;

/// Outcome of reconciling query pins against evidence
enum Reconciled {
    /// Query and evidence disagree on some column
    Contradiction,
    /// Remaining query pins, possibly empty
    Query(Vec<Pin>),
}

/// Drop query pins already implied by the evidence
fn reconcile(query: &[Pin], evidence: &[Pin]) -> Result<Reconciled> {
    let evidence = pin_map(evidence)?;
    let mut remaining: Vec<Pin> = Vec::with_capacity(query.len());
    for (colno, value) in query {
        if let Some(fixed) = evidence.get(colno) {
            if fixed != value {
                return Ok(Reconciled::Contradiction);
            }
            continue;
        }
        match remaining.iter().find(|(c, _)| c == colno) {
            Some((_, other)) if other != value => return Ok(Reconciled::Contradiction),
            Some(_) => {}
            None => remaining.push((*colno, value.clone())),
        }
    }
    Ok(Reconciled::Query(remaining))
}

impl InferenceEngine {
    /// Log density of `query` given `evidence`
    ///
    /// Query pins matching the evidence are dropped and a contradicting pin
    /// gives −∞ without consulting any model. When no replicate is selected
    /// the per-replicate densities are combined with log-mean-exp.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::InvalidArgument` if `query` is empty
    pub fn logpdf(
        &self,
        model: ModelId,
        replicate: Option<usize>,
        query: &[Pin],
        evidence: &[Pin],
        n_samples: Option<usize>,
    ) -> Result<f64> {
        let model = self.ctx.model(model)?;
        self.logpdf_model(&model, replicate, query, evidence, n_samples)
    }

    /// Probability (density) that `colno` takes `value` given `evidence`
    ///
    /// # Errors
    ///
    /// See [`InferenceEngine::logpdf`]
    pub fn column_value_probability(
        &self,
        model: ModelId,
        replicate: Option<usize>,
        colno: ColNo,
        value: &Value,
        evidence: &[Pin],
    ) -> Result<f64> {
        let query = [(colno, value.clone())];
        Ok(self.logpdf(model, replicate, &query, evidence, None)?.exp())
    }

    pub(crate) fn logpdf_model(
        &self,
        model: &CompositeModel,
        replicate: Option<usize>,
        query: &[Pin],
        evidence: &[Pin],
        n_samples: Option<usize>,
    ) -> Result<f64> {
        if query.is_empty() {
            return Err(ComposerError::invalid("logpdf needs at least one query pin"));
        }
        model.check_columns(query.iter().chain(evidence).map(|(c, _)| *c))?;

        let query = match reconcile(query, evidence)? {
            Reconciled::Contradiction => return Ok(f64::NEG_INFINITY),
            Reconciled::Query(query) if query.is_empty() => return Ok(0.0),
            Reconciled::Query(query) => query,
        };

        let replicates = model.select_replicates(replicate)?;
        let n = self.density_samples(n_samples)?;
        let densities = self.per_replicate(model, &replicates, |model, r, rng| {
            self.replicate_logpdf(model, r, &query, evidence, n, rng)
        })?;
        Ok(logmeanexp(&densities))
    }

    /// Log density on one replicate of an already reconciled query
    pub(crate) fn replicate_logpdf(
        &self,
        model: &CompositeModel,
        r: usize,
        query: &[Pin],
        evidence: &[Pin],
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Result<f64> {
        if query.is_empty() {
            return Ok(0.0);
        }
        let graph = model.graph();
        if !graph.touches_foreign(query.iter().chain(evidence).map(|(c, _)| *c)) {
            return self.base_logpdf(model, r, query, evidence);
        }

        let joint: Vec<Pin> = query.iter().chain(evidence).cloned().collect();
        let numerator = self.log_marginal(model, r, &joint, n, rng)?;
        if numerator == f64::NEG_INFINITY {
            return Ok(f64::NEG_INFINITY);
        }
        let denominator = if evidence.is_empty() {
            0.0
        } else {
            self.log_marginal(model, r, evidence, n, rng)?
        };
        trace!(model = %model.id, replicate = r, numerator, denominator, "sampled log density");
        Ok(numerator - denominator)
    }

    /// Importance-sampled log marginal probability of `pins`
    fn log_marginal(
        &self,
        model: &CompositeModel,
        r: usize,
        pins: &[Pin],
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Result<f64> {
        let weights: Vec<f64> = self
            .weighted_hypotheses(model, r, pins, n, rng)?
            .into_iter()
            .map(|h| h.log_weight)
            .collect();
        Ok(logmeanexp(&weights))
    }

    /// Exact chain-rule log density of local pins from the base model
    ///
    /// Each query pin is scored given the evidence and the query pins before
    /// it; a zero probability anywhere gives −∞.
    pub(crate) fn base_logpdf(
        &self,
        model: &CompositeModel,
        r: usize,
        query: &[Pin],
        evidence: &[Pin],
    ) -> Result<f64> {
        let mut given = model.to_base_pins(evidence)?;
        let mut total = 0.0;
        for (colno, value) in query {
            let base_colno = model.base_colno(*colno)?;
            let probability = self.ctx.base.column_value_probability(
                model.base,
                Some(r),
                base_colno,
                value,
                &given,
            )?;
            if probability <= 0.0 {
                return Ok(f64::NEG_INFINITY);
            }
            total += probability.ln();
            given.push((base_colno, value.clone()));
        }
        Ok(total)
    }
}
