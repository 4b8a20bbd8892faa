//! Log-domain Monte Carlo helpers

pub mod mixture;

pub use mixture::GaussianMixtureConfidence;

use composer_core::{Value, ValueKey};
use indexmap::IndexMap;

/// `log(sum(exp(x)))` with max shifting; empty or all −∞ input gives −∞
#[must_use]
pub fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// `log(mean(exp(x)))`; empty or all −∞ input gives −∞
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn logmeanexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    logsumexp(values) - (values.len() as f64).ln()
}

/// Normalised probabilities from log weights
///
/// Returns `None` when every weight is −∞.
#[must_use]
pub fn softmax(log_weights: &[f64]) -> Option<Vec<f64>> {
    let total = logsumexp(log_weights);
    if !total.is_finite() {
        return None;
    }
    Some(log_weights.iter().map(|w| (w - total).exp()).collect())
}

/// Arithmetic mean; `None` for empty input
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Most frequent value and its relative frequency
///
/// Ties go to the value seen first.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mode(values: &[Value]) -> Option<(Value, f64)> {
    let mut counts: IndexMap<ValueKey, (&Value, usize)> = IndexMap::new();
    for value in values {
        counts.entry(value.key()).or_insert((value, 0)).1 += 1;
    }
    let mut best: Option<(&Value, usize)> = None;
    for (value, count) in counts.values() {
        if best.is_none_or(|(_, top)| *count > top) {
            best = Some((value, *count));
        }
    }
    best.map(|(value, count)| (value.clone(), count as f64 / values.len() as f64))
}
