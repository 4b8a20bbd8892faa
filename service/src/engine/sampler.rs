//! Sampling-importance-resampling over a composite model
//!
//! A hypothesis is one joint draw of every column. Local columns come from
//! the base model conditioned on local evidence, foreign columns are walked
//! in topological order: evidence-fixed ones contribute their predictor log
//! density to the hypothesis weight, the rest are sampled from their
//! predictor given the values already drawn for their parents.

use super::InferenceEngine;
use crate::model::CompositeModel;
use crate::stats::softmax;
use composer_core::{ColNo, ComposerError, Conditions, ModelId, Pin, Predictor, Result, Value};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// One joint draw of every column and its log importance weight
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    /// Values indexed by column number
    pub values: Vec<Value>,
    pub log_weight: f64,
}

impl Hypothesis {
    fn project(&self, targets: &[ColNo]) -> Vec<Value> {
        targets.iter().map(|c| self.values[*c].clone()).collect()
    }
}

/// Pins as a column → value map, rejecting a column pinned to two values
pub(crate) fn pin_map(pins: &[Pin]) -> Result<HashMap<ColNo, Value>> {
    let mut map = HashMap::with_capacity(pins.len());
    for (colno, value) in pins {
        if let Some(previous) = map.insert(*colno, value.clone())
            && previous != *value
        {
            return Err(ComposerError::invalid(format!(
                "column {colno} is pinned to both {previous} and {value}"
            )));
        }
    }
    Ok(map)
}

impl InferenceEngine {
    /// Draw `n` joint samples of `targets` given `evidence`
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::InvalidArgument` if `targets` is empty, a
    /// target is also pinned by the evidence, or the evidence has zero
    /// probability under every hypothesis
    pub fn simulate(
        &self,
        model: ModelId,
        replicate: Option<usize>,
        evidence: &[Pin],
        targets: &[ColNo],
        n: usize,
    ) -> Result<Vec<Vec<Value>>> {
        let model = self.ctx.model(model)?;
        self.simulate_model(&model, replicate, evidence, targets, n)
    }

    pub(crate) fn simulate_model(
        &self,
        model: &CompositeModel,
        replicate: Option<usize>,
        evidence: &[Pin],
        targets: &[ColNo],
        n: usize,
    ) -> Result<Vec<Vec<Value>>> {
        if targets.is_empty() {
            return Err(ComposerError::invalid("simulate needs at least one target"));
        }
        model.check_columns(targets.iter().copied())?;
        model.check_columns(evidence.iter().map(|(c, _)| *c))?;
        let pinned = pin_map(evidence)?;
        if let Some(colno) = targets.iter().find(|c| pinned.contains_key(c)) {
            return Err(ComposerError::invalid(format!(
                "column {colno} is both a target and evidence"
            )));
        }
        let replicates = model.select_replicates(replicate)?;
        let n = self.clamp_samples(n)?;

        let graph = model.graph();
        if !graph.touches_foreign(targets.iter().copied().chain(pinned.keys().copied())) {
            debug!(model = %model.id, n, "local-only simulate delegated to base model");
            let mut rng = self.ctx.fork_rng();
            return self.ctx.base.simulate(
                model.base,
                replicate,
                &model.to_base_pins(evidence)?,
                &model.to_base_columns(targets)?,
                n,
                &mut rng,
            );
        }

        if let [r] = replicates.as_slice() {
            let mut rng = self.ctx.fork_rng();
            return self.resample(model, *r, evidence, targets, n, n, &mut rng);
        }

        // Each output row comes from a uniformly chosen replicate
        let mut rng = self.ctx.fork_rng();
        let assignment: Vec<usize> = (0..n)
            .map(|_| rng.gen_range(0..replicates.len()))
            .collect();
        let mut counts = vec![0usize; replicates.len()];
        for slot in &assignment {
            counts[*slot] += 1;
        }

        let batches = self.per_replicate(model, &replicates, |model, r, rng| {
            let Some(slot) = replicates.iter().position(|x| *x == r) else {
                return Ok(Vec::new());
            };
            if counts[slot] == 0 {
                return Ok(Vec::new());
            }
            self.resample(model, r, evidence, targets, n, counts[slot], rng)
        })?;

        let mut batches: Vec<std::vec::IntoIter<Vec<Value>>> =
            batches.into_iter().map(Vec::into_iter).collect();
        assignment
            .into_iter()
            .map(|slot| {
                batches[slot]
                    .next()
                    .ok_or_else(|| ComposerError::invalid("replicate produced too few samples"))
            })
            .collect()
    }

    /// Draw `keep` rows by multinomial resampling from `batch` weighted
    /// hypotheses on replicate `r`
    #[allow(clippy::too_many_arguments)]
    pub(super) fn resample(
        &self,
        model: &CompositeModel,
        r: usize,
        evidence: &[Pin],
        targets: &[ColNo],
        batch: usize,
        keep: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<Value>>> {
        let hypotheses = self.weighted_hypotheses(model, r, evidence, batch, rng)?;
        let log_weights: Vec<f64> = hypotheses.iter().map(|h| h.log_weight).collect();
        let weights = softmax(&log_weights).ok_or_else(|| {
            ComposerError::invalid("evidence has zero probability under every sample")
        })?;
        let index = WeightedIndex::new(&weights)
            .map_err(|e| ComposerError::invalid(format!("cannot resample: {e}")))?;

        Ok((0..keep)
            .map(|_| hypotheses[index.sample(rng)].project(targets))
            .collect())
    }

    /// Weighted joint draws of every column on replicate `r`
    ///
    /// # Errors
    ///
    /// Returns an error if the base model or a predictor fails
    pub(crate) fn weighted_hypotheses(
        &self,
        model: &CompositeModel,
        r: usize,
        evidence: &[Pin],
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Hypothesis>> {
        let graph = model.graph();
        let pinned = pin_map(evidence)?;

        let local_evidence: Vec<Pin> = evidence
            .iter()
            .filter(|(c, _)| graph.is_local(*c))
            .cloned()
            .collect();
        let free_local: Vec<ColNo> = graph.local().filter(|c| !pinned.contains_key(c)).collect();

        let base_weight = if local_evidence.is_empty() {
            0.0
        } else {
            self.base_logpdf(model, r, &local_evidence, &[])?
        };
        trace!(model = %model.id, replicate = r, base_weight, "hypothesis base weight");

        let local_draws = if free_local.is_empty() {
            vec![Vec::new(); n]
        } else {
            let draws = self.ctx.base.simulate(
                model.base,
                Some(r),
                &model.to_base_pins(&local_evidence)?,
                &model.to_base_columns(&free_local)?,
                n,
                rng,
            )?;
            if draws.len() != n || draws.iter().any(|row| row.len() != free_local.len()) {
                return Err(ComposerError::base_model(format!(
                    "simulate returned {} rows, expected {n} rows of {} values",
                    draws.len(),
                    free_local.len()
                )));
            }
            draws
        };

        let predictors: Vec<(ColNo, Arc<dyn Predictor>)> = graph
            .order()
            .iter()
            .map(|c| Ok((*c, self.ctx.predictor(model, *c)?)))
            .collect::<Result<_>>()?;

        let width = model.columns().len();
        let mut hypotheses = Vec::with_capacity(n);
        for draw in local_draws {
            let mut values: Vec<Option<Value>> = vec![None; width];
            for (colno, value) in &pinned {
                values[*colno] = Some(value.clone());
            }
            for (colno, value) in free_local.iter().zip(draw) {
                values[*colno] = Some(value);
            }

            let mut log_weight = base_weight;
            for (colno, predictor) in &predictors {
                let conditions = conditions_for(model, *colno, &values)?;
                match &values[*colno] {
                    Some(value) => log_weight += predictor.logpdf(value, &conditions)?,
                    None => {
                        let value = predictor
                            .simulate(1, &conditions, rng)?
                            .into_iter()
                            .next()
                            .ok_or_else(|| ComposerError::predictor("simulate returned no value"))?;
                        values[*colno] = Some(value);
                    }
                }
            }

            let values = values
                .into_iter()
                .enumerate()
                .map(|(colno, value)| {
                    value.ok_or_else(|| {
                        ComposerError::invalid(format!("column {colno} was never assigned"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            hypotheses.push(Hypothesis { values, log_weight });
        }

        Ok(hypotheses)
    }
}

/// Parent values of a foreign column keyed by parent name
fn conditions_for(
    model: &CompositeModel,
    colno: ColNo,
    values: &[Option<Value>],
) -> Result<Conditions> {
    model
        .graph()
        .parents(colno)
        .iter()
        .map(|parent| {
            let value = values[*parent].clone().ok_or_else(|| {
                ComposerError::invalid(format!(
                    "parent {parent} of column {colno} has no value"
                ))
            })?;
            Ok((model.column_name(*parent)?.to_string(), value))
        })
        .collect()
}
