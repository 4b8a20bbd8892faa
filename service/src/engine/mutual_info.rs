//! Monte Carlo conditional mutual information

use super::InferenceEngine;
use crate::model::CompositeModel;
use crate::stats::mean;
use composer_core::{ColNo, ComposerError, ModelId, Pin, Result, Value};
use rand::RngCore;
use std::collections::BTreeSet;
use tracing::debug;

/// Columns appearing in more than one of `sets`, sorted
fn overlapping(sets: &[&[ColNo]]) -> Vec<ColNo> {
    let mut seen = BTreeSet::new();
    let mut repeated = BTreeSet::new();
    for set in sets {
        for colno in *set {
            if !seen.insert(*colno) {
                repeated.insert(*colno);
            }
        }
    }
    repeated.into_iter().collect()
}

fn pins(columns: &[ColNo], values: &[Value]) -> Vec<Pin> {
    columns.iter().copied().zip(values.iter().cloned()).collect()
}

impl InferenceEngine {
    /// Estimate `I(A; B | C, evidence)` in nats
    ///
    /// Draws `n_samples` joint samples of `A ∪ B ∪ C` given the evidence and
    /// averages `log p(a,b,c) − log p(a,c) − log p(b,c) + log p(c)`.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ColumnSetOverlap` if the sets or the evidence
    /// columns share a column, and `ComposerError::InvalidArgument` if `a` or
    /// `b` is empty
    #[allow(clippy::too_many_arguments)]
    pub fn mutual_information(
        &self,
        model: ModelId,
        replicate: Option<usize>,
        a: &[ColNo],
        b: &[ColNo],
        c: &[ColNo],
        evidence: &[Pin],
        n_samples: Option<usize>,
    ) -> Result<f64> {
        if a.is_empty() || b.is_empty() {
            return Err(ComposerError::invalid(
                "mutual information needs two non-empty column sets",
            ));
        }
        let evidence_columns: Vec<ColNo> = evidence.iter().map(|(colno, _)| *colno).collect();
        let shared = overlapping(&[a, b, c, evidence_columns.as_slice()]);
        if !shared.is_empty() {
            return Err(ComposerError::ColumnSetOverlap { columns: shared });
        }

        let model = self.ctx.model(model)?;
        model.check_columns(a.iter().chain(b).chain(c).chain(&evidence_columns).copied())?;
        let replicates = model.select_replicates(replicate)?;
        let n = self.density_samples(n_samples)?;
        let inner = self.density_samples(None)?;

        let estimates = self.per_replicate(&model, &replicates, |model, r, rng| {
            self.replicate_mutual_information(model, r, (a, b, c), evidence, n, inner, rng)
        })?;
        debug!(model = %model.id, n, ?estimates, "mutual information estimated");
        mean(&estimates).ok_or_else(|| ComposerError::invalid("no replicate evaluated"))
    }

    /// Mutual information between two single columns with no conditioning
    ///
    /// # Errors
    ///
    /// See [`InferenceEngine::mutual_information`]
    pub fn column_mutual_information(
        &self,
        model: ModelId,
        replicate: Option<usize>,
        a: ColNo,
        b: ColNo,
        n_samples: Option<usize>,
    ) -> Result<f64> {
        self.mutual_information(model, replicate, &[a], &[b], &[], &[], n_samples)
    }

    #[allow(clippy::too_many_arguments)]
    fn replicate_mutual_information(
        &self,
        model: &CompositeModel,
        r: usize,
        (a, b, c): (&[ColNo], &[ColNo], &[ColNo]),
        evidence: &[Pin],
        n: usize,
        inner: usize,
        rng: &mut dyn RngCore,
    ) -> Result<f64> {
        let targets: Vec<ColNo> = a.iter().chain(b).chain(c).copied().collect();
        let samples = self.replicate_simulate(model, r, evidence, &targets, n, rng)?;

        let (na, nb) = (a.len(), b.len());
        let ac: Vec<ColNo> = a.iter().chain(c).copied().collect();
        let bc: Vec<ColNo> = b.iter().chain(c).copied().collect();

        let mut terms = Vec::with_capacity(samples.len());
        for sample in samples {
            let va = &sample[..na];
            let vb = &sample[na..na + nb];
            let vc = &sample[na + nb..];
            let vac: Vec<Value> = va.iter().chain(vc).cloned().collect();
            let vbc: Vec<Value> = vb.iter().chain(vc).cloned().collect();

            let log_abc =
                self.replicate_logpdf(model, r, &pins(&targets, &sample), evidence, inner, rng)?;
            let log_ac = self.replicate_logpdf(model, r, &pins(&ac, &vac), evidence, inner, rng)?;
            let log_bc = self.replicate_logpdf(model, r, &pins(&bc, &vbc), evidence, inner, rng)?;
            let log_c = self.replicate_logpdf(model, r, &pins(c, vc), evidence, inner, rng)?;
            terms.push(log_abc - log_ac - log_bc + log_c);
        }

        mean(&terms).ok_or_else(|| ComposerError::invalid("no samples drawn"))
    }

    /// Joint samples on one replicate, taking the fast path when possible
    fn replicate_simulate(
        &self,
        model: &CompositeModel,
        r: usize,
        evidence: &[Pin],
        targets: &[ColNo],
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<Value>>> {
        let graph = model.graph();
        if graph.touches_foreign(targets.iter().chain(evidence.iter().map(|(c, _)| c)).copied()) {
            self.resample(model, r, evidence, targets, n, n, rng)
        } else {
            self.ctx.base.simulate(
                model.base,
                Some(r),
                &model.to_base_pins(evidence)?,
                &model.to_base_columns(targets)?,
                n,
                rng,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_columns() {
        let disjoint: [&[ColNo]; 3] = [&[0, 1], &[2], &[3]];
        assert!(overlapping(&disjoint).is_empty());

        let cyclic: [&[ColNo]; 3] = [&[0, 1], &[1, 2], &[2, 0]];
        assert_eq!(overlapping(&cyclic), vec![0, 1, 2]);

        let with_empty: [&[ColNo]; 3] = [&[4], &[], &[4]];
        assert_eq!(overlapping(&with_empty), vec![4]);
    }
}
