//! Error types for composite model operations

use thiserror::Error;

/// Main error type for composite model operations
#[derive(Error, Debug)]
pub enum ComposerError {
    /// Schema parsing and validation errors
    #[error("Invalid schema: {message}")]
    SchemaError {
        /// Error message
        message: String,
        /// Block/token position in the schema if available
        location: Option<String>,
    },

    /// The foreign-column parent graph has no acyclic evaluation order
    #[error("Cyclic dependency among columns: {}", nodes.join(", "))]
    CyclicDependency {
        /// Nodes still unscheduled when no progress could be made
        nodes: Vec<String>,
    },

    /// A predictor builder with the same name is already registered
    #[error("A foreign predictor named '{0}' has already been registered")]
    DuplicateBuilderName(String),

    /// A persisted assignment names a builder that is not registered
    #[error("Foreign predictor '{builder}' for column '{column}' is not registered")]
    UnregisteredPredictor {
        /// Builder name from the persisted assignment
        builder: String,
        /// Column the predictor models
        column: String,
    },

    /// Imputation target row is absent from the table
    #[error("No such row {rowid} in table '{table}'")]
    RowNotFound {
        /// Table that was searched
        table: String,
        /// Requested row id
        rowid: u64,
    },

    /// Mutual-information column sets are not pairwise disjoint
    #[error("Column sets must be disjoint, duplicated columns: {columns:?}")]
    ColumnSetOverlap {
        /// Column numbers appearing in more than one set
        columns: Vec<usize>,
    },

    /// Operation intentionally not supported
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Composite model does not exist
    #[error("No such composite model: {0}")]
    ModelNotFound(String),

    /// Table does not exist
    #[error("No such table: {0}")]
    TableNotFound(String),

    /// Column does not exist in the model
    #[error("No such column: {0}")]
    ColumnNotFound(String),

    /// Query issued before the model has trained replicates/predictors
    #[error("Composite model '{0}' has not been initialized")]
    ModelNotInitialized(String),

    /// Caller supplied an argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by the base model capability
    #[error("Base model error: {0}")]
    BaseModel(String),

    /// Failure reported by a foreign predictor or its builder
    #[error("Foreign predictor error: {0}")]
    Predictor(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for composite model operations
pub type Result<T> = std::result::Result<T, ComposerError>;

impl ComposerError {
    /// Create a new schema error
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaError {
            message: message.into(),
            location: None,
        }
    }

    /// Create a new schema error with location
    #[must_use]
    pub fn schema_at(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::SchemaError {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// Create a new unregistered predictor error
    #[must_use]
    pub fn unregistered(builder: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnregisteredPredictor {
            builder: builder.into(),
            column: column.into(),
        }
    }

    /// Create a new invalid argument error
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a new base model error
    #[must_use]
    pub fn base_model(message: impl Into<String>) -> Self {
        Self::BaseModel(message.into())
    }

    /// Create a new predictor error
    #[must_use]
    pub fn predictor(message: impl Into<String>) -> Self {
        Self::Predictor(message.into())
    }

    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a new unsupported operation error
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError(message.into())
    }

    /// Whether this error originates from schema validation
    #[must_use]
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::SchemaError { .. })
    }
}

impl From<serde_json::Error> for ComposerError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ComposerError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
