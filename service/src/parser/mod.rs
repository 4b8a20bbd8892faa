//! Schema parsing for composite models
//!
//! A schema is an ordered sequence of directive blocks. The base-model
//! directive declares local columns, each registered predictor-builder name
//! declares one foreign column with its parents, and `dependent` /
//! `independent` pass constraints through to the base model.

pub mod lexer;
pub mod schema_parser;

pub use lexer::{SchemaBlock, parse_blocks};
pub use schema_parser::{Directive, DirectiveTable, ParsedSchema, SchemaParser};
