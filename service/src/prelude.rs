//! Prelude module for the composer service
//!
//! This module re-exports commonly used types and functions for convenient import.

// Re-export core types and traits
pub use composer_core::prelude::*;

// Re-export the facade and its parts
pub use crate::service::{Composer, ComposerBuilder};
pub use crate::engine::InferenceEngine;
pub use crate::lifecycle::ModelLifecycle;

// Re-export parser utilities
pub use crate::parser::{SchemaBlock, SchemaParser, parse_blocks};

// Re-export storage and registry types
pub use crate::registry::{PredictorCache, PredictorRegistry};
pub use crate::store::{CompositeStore, InMemoryStore};

// Re-export the default confidence estimator
pub use crate::stats::GaussianMixtureConfidence;
