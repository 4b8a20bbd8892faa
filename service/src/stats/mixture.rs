//! One-dimensional Gaussian mixture used to score numerical imputations
//!
//! Mixtures with 1..=`max_components` components are fitted by EM and the
//! one with the lowest BIC is kept. The confidence is the weight of its
//! heaviest component after pruning components lighter than
//! `min_component_weight`.

use super::logsumexp;
use composer_core::config::ImputationConfig;
use composer_core::{ComposerError, ConfidenceEstimator, Result};
use std::f64::consts::PI;
use tracing::trace;

/// Relative spread below which samples are treated as a single point
const DEGENERATE_SPREAD: f64 = 1e-12;

/// Variance floor relative to the sample variance
const VARIANCE_FLOOR: f64 = 1e-6;

/// Fitted mixture parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Mixture {
    pub weights: Vec<f64>,
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
    pub log_likelihood: f64,
}

impl Mixture {
    #[allow(clippy::cast_precision_loss)]
    fn bic(&self, n: usize) -> f64 {
        let parameters = (3 * self.weights.len() - 1) as f64;
        -2.0 * self.log_likelihood + parameters * (n as f64).ln()
    }
}

/// Default [`ConfidenceEstimator`] backed by EM on a Gaussian mixture
#[derive(Debug, Clone)]
pub struct GaussianMixtureConfidence {
    max_components: usize,
    iterations: usize,
    min_weight: f64,
}

impl GaussianMixtureConfidence {
    #[must_use]
    pub fn new(max_components: usize, iterations: usize, min_weight: f64) -> Self {
        Self {
            max_components: max_components.max(1),
            iterations: iterations.max(1),
            min_weight,
        }
    }

    #[must_use]
    pub fn from_config(config: &ImputationConfig) -> Self {
        Self::new(
            config.max_components,
            config.em_iterations,
            config.min_component_weight,
        )
    }

    /// Fit a `k`-component mixture to `samples`
    ///
    /// Returns `None` when there are no samples.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(&self, samples: &[f64], k: usize) -> Option<Mixture> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len();
        let k = k.clamp(1, n);
        let nf = n as f64;

        let overall_mean = samples.iter().sum::<f64>() / nf;
        let overall_var = samples
            .iter()
            .map(|x| (x - overall_mean).powi(2))
            .sum::<f64>()
            / nf;
        let floor = (overall_var * VARIANCE_FLOOR).max(f64::MIN_POSITIVE);

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mut means: Vec<f64> = (0..k).map(|j| sorted[(2 * j + 1) * n / (2 * k)]).collect();
        let mut variances = vec![overall_var.max(floor); k];
        let mut weights = vec![1.0 / k as f64; k];

        let mut responsibilities = vec![0.0; n * k];
        let mut log_likelihood = f64::NEG_INFINITY;
        let mut terms = vec![0.0; k];

        for iteration in 0..self.iterations {
            let mut current = 0.0;
            for (i, x) in samples.iter().enumerate() {
                for j in 0..k {
                    terms[j] = weights[j].ln() + log_normal(*x, means[j], variances[j]);
                }
                let norm = logsumexp(&terms);
                current += norm;
                for j in 0..k {
                    responsibilities[i * k + j] = (terms[j] - norm).exp();
                }
            }

            for j in 0..k {
                let nj: f64 = (0..n).map(|i| responsibilities[i * k + j]).sum();
                if nj <= f64::EPSILON {
                    weights[j] = 0.0;
                    continue;
                }
                weights[j] = nj / nf;
                means[j] = (0..n)
                    .map(|i| responsibilities[i * k + j] * samples[i])
                    .sum::<f64>()
                    / nj;
                variances[j] = ((0..n)
                    .map(|i| responsibilities[i * k + j] * (samples[i] - means[j]).powi(2))
                    .sum::<f64>()
                    / nj)
                    .max(floor);
            }

            let converged = (current - log_likelihood).abs() < 1e-8 * nf;
            log_likelihood = current;
            if converged {
                trace!(k, iteration, "mixture fit converged");
                break;
            }
        }

        Some(Mixture {
            weights,
            means,
            variances,
            log_likelihood,
        })
    }
}

impl ConfidenceEstimator for GaussianMixtureConfidence {
    fn confidence(&self, samples: &[f64]) -> Result<f64> {
        if samples.is_empty() {
            return Err(ComposerError::invalid(
                "confidence requires at least one sample",
            ));
        }
        if samples.iter().any(|x| !x.is_finite()) {
            return Err(ComposerError::invalid(
                "confidence requires finite samples",
            ));
        }

        let (lo, hi) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(*x), hi.max(*x))
            });
        if hi - lo <= DEGENERATE_SPREAD * hi.abs().max(lo.abs()).max(1.0) {
            return Ok(1.0);
        }

        let mut distinct = samples.to_vec();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        let max_k = self.max_components.min(distinct.len());

        let best = (1..=max_k)
            .filter_map(|k| self.fit(samples, k))
            .min_by(|a, b| a.bic(samples.len()).total_cmp(&b.bic(samples.len())))
            .ok_or_else(|| ComposerError::invalid("no mixture could be fitted"))?;

        let kept: Vec<f64> = best
            .weights
            .iter()
            .copied()
            .filter(|w| *w >= self.min_weight)
            .collect();
        let total: f64 = kept.iter().sum();
        if total <= 0.0 {
            return Ok(0.0);
        }
        let top = kept.iter().copied().fold(0.0, f64::max);
        Ok((top / total).clamp(0.0, 1.0))
    }
}

fn log_normal(x: f64, mean: f64, variance: f64) -> f64 {
    -0.5 * ((2.0 * PI * variance).ln() + (x - mean).powi(2) / variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn normal(rng: &mut StdRng, mean: f64, sd: f64) -> f64 {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        mean + sd * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn estimator() -> GaussianMixtureConfidence {
        GaussianMixtureConfidence::from_config(&ImputationConfig::default())
    }

    #[test]
    fn test_identical_samples_are_certain() {
        assert_eq!(estimator().confidence(&[3.0; 20]).unwrap(), 1.0);
        assert_eq!(estimator().confidence(&[7.5]).unwrap(), 1.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(estimator().confidence(&[]).is_err());
        assert!(estimator().confidence(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_unimodal_is_confident() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<f64> = (0..300).map(|_| normal(&mut rng, 5.0, 1.0)).collect();
        let confidence = estimator().confidence(&samples).unwrap();
        assert!(confidence > 0.8, "confidence {confidence}");
    }

    #[test]
    fn test_bimodal_splits_confidence() {
        let mut rng = StdRng::seed_from_u64(11);
        let samples: Vec<f64> = (0..400)
            .map(|i| {
                let center = if i % 2 == 0 { -20.0 } else { 20.0 };
                normal(&mut rng, center, 1.0)
            })
            .collect();
        let confidence = estimator().confidence(&samples).unwrap();
        assert!((0.4..0.65).contains(&confidence), "confidence {confidence}");
    }

    #[test]
    fn test_single_component_fit_matches_moments() {
        let samples = [1.0, 2.0, 3.0, 4.0];
        let mixture = estimator().fit(&samples, 1).unwrap();
        assert!((mixture.means[0] - 2.5).abs() < 1e-12);
        assert!((mixture.variances[0] - 1.25).abs() < 1e-12);
        assert_eq!(mixture.weights, vec![1.0]);
    }

    #[test]
    fn test_fit_without_samples() {
        assert!(estimator().fit(&[], 1).is_none());
        assert!(estimator().fit(&[], 3).is_none());
    }
}
