//! Column dependence probability
//!
//! Two columns are dependent if the base model says so (both local), if one
//! is a declared parent of the other, or if some parent of the foreign side
//! is dependent on the other side. The recursion runs on an explicit stack
//! with a memo keyed by the unordered column pair.

use super::InferenceEngine;
use crate::model::CompositeModel;
use crate::stats::mean;
use composer_core::{ColNo, ModelId, Result};
use std::collections::HashMap;
use tracing::trace;

type PairKey = (ColNo, ColNo);

fn key(a: ColNo, b: ColNo) -> PairKey {
    if a <= b { (a, b) } else { (b, a) }
}

enum Frame {
    Expand(ColNo, ColNo),
    /// Resolve `pair` once every sub-pair has been memoized
    Combine(PairKey, Vec<PairKey>),
}

impl InferenceEngine {
    /// Probability that columns `a` and `b` are dependent
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ColumnNotFound` for an unknown column or the
    /// base model's error
    pub fn column_dependence_probability(
        &self,
        model: ModelId,
        replicate: Option<usize>,
        a: ColNo,
        b: ColNo,
    ) -> Result<f64> {
        let model = self.ctx.model(model)?;
        model.check_columns([a, b])?;
        if a == b {
            return Ok(1.0);
        }
        let replicates = model.select_replicates(replicate)?;

        let graph = model.graph();
        if graph.is_local(a) && graph.is_local(b) {
            return self.ctx.base.column_dependence_probability(
                model.base,
                replicate,
                model.base_colno(a)?,
                model.base_colno(b)?,
            );
        }

        let answers = self.per_replicate(&model, &replicates, |model, r, _| {
            Ok(if self.dependent(model, r, a, b)? { 1.0 } else { 0.0 })
        })?;
        Ok(mean(&answers).unwrap_or(0.0))
    }

    /// Whether `a` and `b` are dependent on replicate `r`
    fn dependent(&self, model: &CompositeModel, r: usize, a: ColNo, b: ColNo) -> Result<bool> {
        let graph = model.graph();
        let mut memo: HashMap<PairKey, bool> = HashMap::new();
        let mut stack = vec![Frame::Expand(a, b)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Expand(x, y) => {
                    let pair = key(x, y);
                    if memo.contains_key(&pair) {
                        continue;
                    }

                    if x == y || graph.is_parent(x, y) || graph.is_parent(y, x) {
                        memo.insert(pair, true);
                        continue;
                    }
                    if graph.is_local(x) && graph.is_local(y) {
                        let probability = self.ctx.base.column_dependence_probability(
                            model.base,
                            Some(r),
                            model.base_colno(x)?,
                            model.base_colno(y)?,
                        )?;
                        memo.insert(pair, probability > 0.0);
                        continue;
                    }

                    let children: Vec<PairKey> = match (graph.is_foreign(x), graph.is_foreign(y)) {
                        (true, true) => graph
                            .parents(x)
                            .iter()
                            .flat_map(|p| graph.parents(y).iter().map(move |q| key(*p, *q)))
                            .collect(),
                        (true, false) => graph.parents(x).iter().map(|p| key(*p, y)).collect(),
                        (false, true) => graph.parents(y).iter().map(|q| key(x, *q)).collect(),
                        (false, false) => Vec::new(),
                    };

                    let pending: Vec<PairKey> = children
                        .iter()
                        .copied()
                        .filter(|child| !memo.contains_key(child))
                        .collect();
                    stack.push(Frame::Combine(pair, children));
                    stack.extend(pending.into_iter().map(|(p, q)| Frame::Expand(p, q)));
                }
                Frame::Combine(pair, children) => {
                    let dependent = children
                        .iter()
                        .any(|child| memo.get(child).copied().unwrap_or(false));
                    memo.insert(pair, dependent);
                }
            }
        }

        let dependent = memo.get(&key(a, b)).copied().unwrap_or(false);
        trace!(model = %model.id, replicate = r, a, b, dependent, pairs = memo.len(), "dependence resolved");
        Ok(dependent)
    }
}
