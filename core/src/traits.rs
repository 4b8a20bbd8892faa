//! Capability traits consumed by the composite model
//!
//! The composite engine never inspects the internals of the base model or of
//! foreign predictors. Everything it needs is expressed here.

use crate::error::Result;
use crate::table::Table;
use crate::types::{BaseModelId, ColNo, ColumnSpec, DependencyConstraint, Pin, RowId, StatType, Value};
use indexmap::IndexMap;
use rand::RngCore;
use std::any::Any;
use std::time::Duration;

/// Parent values handed to a predictor, keyed by case-folded column name
pub type Conditions = IndexMap<String, Value>;

/// Joint-probability model over the local columns
///
/// Every operation addresses one base model by id; replicate selectors of
/// `None` ask the base model to aggregate over all of its replicates.
pub trait BaseModel: Send + Sync {
    /// Create a base model over `columns` of `table`
    ///
    /// # Errors
    ///
    /// Returns an error if the base model rejects the schema
    fn create(
        &self,
        name: &str,
        table: &Table,
        columns: &[ColumnSpec],
        dependencies: &[DependencyConstraint],
    ) -> Result<BaseModelId>;

    /// Drop a base model and all of its replicates
    ///
    /// # Errors
    ///
    /// Returns an error if the model does not exist
    fn drop_model(&self, id: BaseModelId) -> Result<()>;

    /// Add `replicates` freshly initialized replicates
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails
    fn initialize(&self, id: BaseModelId, replicates: usize) -> Result<()>;

    /// Run inference on some (or all) replicates
    ///
    /// # Errors
    ///
    /// Returns an error if analysis fails
    fn analyze(
        &self,
        id: BaseModelId,
        replicates: Option<&[usize]>,
        iterations: u32,
        max_duration: Option<Duration>,
    ) -> Result<()>;

    /// Number of replicates currently held
    ///
    /// # Errors
    ///
    /// Returns an error if the model does not exist
    fn replicate_count(&self, id: BaseModelId) -> Result<usize>;

    /// Column number of a (case-folded) column name
    ///
    /// # Errors
    ///
    /// Returns an error if the column is unknown
    fn column_number(&self, id: BaseModelId, name: &str) -> Result<ColNo>;

    /// Column name of a column number
    ///
    /// # Errors
    ///
    /// Returns an error if the column is unknown
    fn column_name(&self, id: BaseModelId, colno: ColNo) -> Result<String>;

    /// Declared stattype of a column
    ///
    /// # Errors
    ///
    /// Returns an error if the column is unknown
    fn column_stattype(&self, id: BaseModelId, colno: ColNo) -> Result<StatType>;

    /// Draw `n` joint samples of `targets` given `evidence`
    ///
    /// # Errors
    ///
    /// Returns an error if sampling fails
    fn simulate(
        &self,
        id: BaseModelId,
        replicate: Option<usize>,
        evidence: &[Pin],
        targets: &[ColNo],
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<Value>>>;

    /// Probability (density) of `colno = value` given `evidence`
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be evaluated
    fn column_value_probability(
        &self,
        id: BaseModelId,
        replicate: Option<usize>,
        colno: ColNo,
        value: &Value,
        evidence: &[Pin],
    ) -> Result<f64>;

    /// Probability that two columns are dependent
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be evaluated
    fn column_dependence_probability(
        &self,
        id: BaseModelId,
        replicate: Option<usize>,
        a: ColNo,
        b: ColNo,
    ) -> Result<f64>;

    /// Similarity of two rows over `columns`
    ///
    /// # Errors
    ///
    /// Returns an error if either row is unknown
    fn row_similarity(
        &self,
        id: BaseModelId,
        replicate: Option<usize>,
        rowid: RowId,
        other: RowId,
        columns: &[ColNo],
    ) -> Result<f64>;

    /// Impute one cell with a confidence in `[0, 1]`
    ///
    /// # Errors
    ///
    /// Returns an error if the row is unknown
    fn predict_confidence(
        &self,
        id: BaseModelId,
        replicate: Option<usize>,
        colno: ColNo,
        rowid: RowId,
    ) -> Result<(Value, f64)>;
}

/// Trained model of one foreign column given its parents
pub trait Predictor: Send + Sync {
    /// Draw `n` values given the parent values
    ///
    /// # Errors
    ///
    /// Returns an error if the conditions are incomplete
    fn simulate(&self, n: usize, conditions: &Conditions, rng: &mut dyn RngCore)
    -> Result<Vec<Value>>;

    /// Log density (or log mass) of `value` given the parent values
    ///
    /// # Errors
    ///
    /// Returns an error if the conditions are incomplete
    fn logpdf(&self, value: &Value, conditions: &Conditions) -> Result<f64>;

    /// Downcast hook used by builders when serializing
    fn as_any(&self) -> &dyn Any;
}

/// Factory for one family of foreign predictors
///
/// The builder name doubles as a schema directive keyword.
pub trait PredictorBuilder: Send + Sync {
    /// Directive name of this builder
    fn name(&self) -> &str;

    /// Train a predictor of `targets` given `conditions` on `table`
    ///
    /// # Errors
    ///
    /// Returns an error if training fails
    fn create(
        &self,
        table: &Table,
        targets: &[ColumnSpec],
        conditions: &[ColumnSpec],
    ) -> Result<Box<dyn Predictor>>;

    /// Binary representation of a predictor built by this builder
    ///
    /// # Errors
    ///
    /// Returns an error if the predictor was not built by this builder
    fn serialize(&self, predictor: &dyn Predictor) -> Result<Vec<u8>>;

    /// Restore a predictor from its binary representation
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are malformed
    fn deserialize(&self, bytes: &[u8]) -> Result<Box<dyn Predictor>>;
}

/// Confidence of a numerical imputation from posterior samples
pub trait ConfidenceEstimator: Send + Sync {
    /// Confidence in `[0, 1]` that the samples describe a single mode
    ///
    /// # Errors
    ///
    /// Returns an error if `samples` is empty or not finite
    fn confidence(&self, samples: &[f64]) -> Result<f64>;
}
