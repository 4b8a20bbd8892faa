//! Core type definitions for composite models and their data

use crate::error::{ComposerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column number inside a composite (or base) model
pub type ColNo = usize;

/// Row identifier inside a table
pub type RowId = u64;

/// A column pinned to a value, used for both queries and evidence
pub type Pin = (ColNo, Value);

/// Identifier of a composite model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u64);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a model owned by the base model capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaseModelId(pub u64);

impl fmt::Display for BaseModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "base#{}", self.0)
    }
}

/// Declared statistical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    /// Real-valued column
    Numerical,
    /// Finite set of labels
    Categorical,
}

impl StatType {
    /// Lower-case keyword used in schemas
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numerical => "numerical",
            Self::Categorical => "categorical",
        }
    }
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatType {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "numerical" => Ok(Self::Numerical),
            "categorical" => Ok(Self::Categorical),
            other => Err(ComposerError::schema(format!("Invalid stattype \"{other}\""))),
        }
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Numeric value
    Number(f64),
    /// Text label
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it is a number
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(x) => Some(*x),
            Self::Text(_) => None,
        }
    }

    /// Text view of the value, if it is a label
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }

    /// Hashable key identifying the value
    #[must_use]
    pub fn key(&self) -> ValueKey {
        match self {
            // Fold -0.0 into 0.0 so equal numbers share a key
            Self::Number(x) if *x == 0.0 => ValueKey::Number(0.0_f64.to_bits()),
            Self::Number(x) => ValueKey::Number(x.to_bits()),
            Self::Text(s) => ValueKey::Text(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Number(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Hashable identity of a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    /// Bit pattern of a number
    Number(u64),
    /// Label
    Text(String),
}

/// A column name paired with its declared stattype
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Case-folded column name
    pub name: String,
    /// Declared stattype
    pub stattype: StatType,
}

impl ColumnSpec {
    /// Create a new column spec, case-folding the name
    #[must_use]
    pub fn new(name: impl AsRef<str>, stattype: StatType) -> Self {
        Self {
            name: casefold(name.as_ref()),
            stattype,
        }
    }
}

/// Mutual pairwise (in)dependence asserted over local columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConstraint {
    /// `true` for `dependent(...)`, `false` for `independent(...)`
    pub dependent: bool,
    /// Case-folded column names
    pub columns: Vec<String>,
}

/// Case-fold an identifier the way every schema and query name is compared
#[must_use]
pub fn casefold(name: &str) -> String {
    name.to_lowercase()
}
