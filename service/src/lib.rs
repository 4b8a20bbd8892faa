//! # Composer Service
//!
//! Composite inference over a base joint-probability model plus foreign
//! predictors.
//!
//! A composite model splits its columns into "local" columns, modeled
//! jointly by a [`BaseModel`](composer_core::BaseModel), and "foreign"
//! columns, each modeled by a trained [`Predictor`](composer_core::Predictor)
//! conditioned on a set of parent columns. The engine treats the two as one
//! joint distribution and answers sampling, density, dependence, mutual
//! information and imputation queries over it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use composer_service::prelude::*;
//! use std::sync::Arc;
//!
//! let composer = Composer::new(base_model, ComposerConfig::default())?;
//! composer.register_predictor(Arc::new(RandomForestBuilder::default()))?;
//! composer.register_table(table);
//!
//! let id = composer.lifecycle().create_model_from_text(
//!     "satellites_cc",
//!     "satellites",
//!     "default(perigee numerical, apogee numerical),
//!      kepler(period numerical given perigee, apogee)",
//! )?;
//! composer.lifecycle().initialize_models(id, 4)?;
//!
//! let period = composer.engine().column_number(id, "period")?;
//! let draws = composer.engine().simulate(id, None, &[], &[period], 100)?;
//! ```
//!
//! ## Layout
//!
//! - [`parser`]: schema mini-language and validation
//! - [`graph`]: ownership/parent graph and topological scheduling
//! - [`registry`]: predictor-builder registry and trained-predictor cache
//! - [`store`]: persisted records with atomic transactions
//! - [`engine`]: simulate, logpdf, dependence, mutual information, imputation
//! - [`lifecycle`]: create, initialize, analyze and drop composite models

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // sample counts converted for averaging
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::similar_names)]

/// Configuration loading
pub mod config;

/// Shared collaborators
pub mod context;

/// Inference engine
pub mod engine;

/// Ownership graph and scheduling
pub mod graph;

/// Model lifecycle management
pub mod lifecycle;

/// Composite model view
pub mod model;

/// Schema parsing
pub mod parser;

/// Predictor registry and cache
pub mod registry;

/// Composer facade
pub mod service;

/// Log-domain statistics and mixture confidence
pub mod stats;

/// Persisted composite model records
pub mod store;

pub use context::ComposerContext;
pub use engine::InferenceEngine;
pub use lifecycle::ModelLifecycle;
pub use service::{Composer, ComposerBuilder};

/// Prelude module for convenient imports
pub mod prelude;
