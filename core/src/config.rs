//! Configuration structures for the composite engine

use crate::error::{ComposerError, Result};
use serde::{Deserialize, Serialize};

/// Main composer configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Monte Carlo sampling configuration
    pub sampling: SamplingConfig,

    /// Imputation configuration
    pub imputation: ImputationConfig,

    /// Schema parser configuration
    pub parser: ParserConfig,
}

/// Sampling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Default number of weighted samples per estimate
    pub n_samples: usize,

    /// Upper bound on any requested sample count
    pub max_samples: usize,

    /// Evaluate replicates in parallel when no replicate is selected
    pub parallel: bool,

    /// Worker threads for parallel replicate evaluation
    pub threads: usize,

    /// Seed of the master random stream, entropy when absent
    pub seed: Option<u64>,
}

/// Imputation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImputationConfig {
    /// Posterior samples drawn per imputed cell
    pub n_samples: usize,

    /// Maximum mixture components for numerical confidence
    pub max_components: usize,

    /// EM iterations for the mixture fit
    pub em_iterations: usize,

    /// Components lighter than this are pruned after fitting
    pub min_component_weight: f64,
}

/// Parser configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Directive names that declare base-model columns
    pub base_aliases: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            n_samples: 100,
            max_samples: 100_000,
            parallel: true,
            threads: num_cpus::get(),
            seed: None,
        }
    }
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            n_samples: 100,
            max_components: 5,
            em_iterations: 100,
            min_component_weight: 0.01,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_aliases: vec!["default".to_string(), "crosscat".to_string()],
        }
    }
}

impl ComposerConfig {
    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ConfigError` naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.sampling.n_samples == 0 {
            return Err(ComposerError::config(
                "sampling.n_samples must be greater than 0",
            ));
        }

        if self.sampling.max_samples < self.sampling.n_samples {
            return Err(ComposerError::config(
                "sampling.max_samples must be at least sampling.n_samples",
            ));
        }

        if self.sampling.threads == 0 {
            return Err(ComposerError::config(
                "sampling.threads must be greater than 0",
            ));
        }

        if self.imputation.n_samples == 0 {
            return Err(ComposerError::config(
                "imputation.n_samples must be greater than 0",
            ));
        }

        if self.imputation.max_components == 0 {
            return Err(ComposerError::config(
                "imputation.max_components must be greater than 0",
            ));
        }

        if !(0.0..1.0).contains(&self.imputation.min_component_weight) {
            return Err(ComposerError::config(
                "imputation.min_component_weight must be in [0, 1)",
            ));
        }

        if self.parser.base_aliases.is_empty() {
            return Err(ComposerError::config(
                "parser.base_aliases must name at least one directive",
            ));
        }

        Ok(())
    }

    /// Development configuration: small, reproducible, single threaded
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.sampling.parallel = false;
        config.sampling.seed = Some(0);
        config
    }

    /// Testing configuration: deterministic and larger sample counts so
    /// Monte Carlo assertions are tight
    #[must_use]
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.sampling.n_samples = 1000;
        config.sampling.parallel = false;
        config.sampling.threads = 1;
        config.sampling.seed = Some(42);
        config.imputation.n_samples = 500;
        config
    }

    /// Production configuration
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.sampling.n_samples = 500;
        config.imputation.n_samples = 1000;
        config
    }
}
