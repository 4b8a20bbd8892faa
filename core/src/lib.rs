//! # Composer Core
//!
//! Core types and capability traits for composing a base joint-probability
//! model over "local" columns with foreign predictors over "foreign" columns.
//!
//! This crate holds everything the composition engine and its collaborators
//! must agree on: the value and column types, the error taxonomy, the data
//! table handed to trainers, and the capability traits for the base model,
//! predictor builders and predictors.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)] // Documentation is covered by module-level docs

/// Core error types
pub mod error;

/// Capability traits for base models, predictors and estimators
pub mod traits;

/// Value, column and identifier types
pub mod types;

/// Data table handed to base models and predictor builders
pub mod table;

/// Configuration types
pub mod config;

// Re-export commonly used types
pub use config::ComposerConfig;
pub use error::{ComposerError, Result};
pub use table::Table;
pub use traits::{BaseModel, ConfidenceEstimator, Conditions, Predictor, PredictorBuilder};
pub use types::{
    BaseModelId, ColNo, ColumnSpec, DependencyConstraint, ModelId, Pin, RowId, StatType, Value,
    ValueKey, casefold,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{ComposerError, Result};
    pub use crate::table::Table;
    pub use crate::traits::*;
    pub use crate::types::*;
}
