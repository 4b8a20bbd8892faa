//! In-process base model treating every local column as independent
//!
//! Column distributions are learned from the training table: categorical
//! columns keep their empirical frequencies (in first-seen order), numerical
//! columns a mean and standard deviation.

use composer_core::{
    BaseModel, BaseModelId, ColNo, ColumnSpec, ComposerError, DependencyConstraint, Pin, Result,
    RowId, StatType, Table, Value,
};
use parking_lot::Mutex;
use rand::RngCore;
use rand::distributions::{Distribution, WeightedIndex};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Marginal {
    Categorical(Vec<(Value, f64)>),
    Numerical { mean: f64, sd: f64 },
}

impl Marginal {
    fn learn(table: &Table, column: &ColumnSpec) -> Result<Self> {
        let values: Vec<Value> = table
            .column_values(&column.name)?
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        match column.stattype {
            StatType::Categorical => {
                let mut counts: Vec<(Value, f64)> = Vec::new();
                for value in &values {
                    match counts.iter_mut().find(|(v, _)| v == value) {
                        Some((_, count)) => *count += 1.0,
                        None => counts.push((value.clone(), 1.0)),
                    }
                }
                let total = values.len() as f64;
                Ok(Self::Categorical(
                    counts.into_iter().map(|(v, c)| (v, c / total)).collect(),
                ))
            }
            StatType::Numerical => {
                let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
                let n = numbers.len().max(1) as f64;
                let mean = numbers.iter().sum::<f64>() / n;
                let var = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                Ok(Self::Numerical {
                    mean,
                    sd: var.sqrt().max(1e-3),
                })
            }
        }
    }

    fn probability(&self, value: &Value) -> f64 {
        match (self, value) {
            (Self::Categorical(weights), _) => weights
                .iter()
                .find(|(v, _)| v == value)
                .map_or(0.0, |(_, p)| *p),
            (Self::Numerical { mean, sd }, Value::Number(x)) => {
                (-0.5 * ((x - mean) / sd).powi(2)).exp() / (sd * (2.0 * PI).sqrt())
            }
            (Self::Numerical { .. }, Value::Text(_)) => 0.0,
        }
    }

    fn draw(&self, index: usize, deterministic: bool, rng: &mut dyn RngCore) -> Value {
        match self {
            Self::Categorical(weights) if deterministic => weights[index % weights.len()].0.clone(),
            Self::Categorical(weights) => {
                let dist = WeightedIndex::new(weights.iter().map(|(_, p)| *p))
                    .expect("non-empty categorical marginal");
                weights[dist.sample(rng)].0.clone()
            }
            Self::Numerical { mean, .. } if deterministic => Value::Number(*mean),
            Self::Numerical { mean, sd } => {
                let u1 = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
                let u2 = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
                let z = (-2.0 * (u1.max(f64::MIN_POSITIVE)).ln()).sqrt() * (2.0 * PI * u2).cos();
                Value::Number(mean + sd * z)
            }
        }
    }

    fn mode(&self) -> (Value, f64) {
        match self {
            Self::Categorical(weights) => weights
                .iter()
                .fold(None::<&(Value, f64)>, |best, item| match best {
                    Some(top) if top.1 >= item.1 => Some(top),
                    _ => Some(item),
                })
                .map_or((Value::Number(0.0), 0.0), |(v, p)| (v.clone(), *p)),
            Self::Numerical { mean, .. } => (Value::Number(*mean), 1.0),
        }
    }
}

#[derive(Debug)]
struct StubModel {
    columns: Vec<ColumnSpec>,
    marginals: Vec<Marginal>,
    table: Table,
    dependencies: Vec<DependencyConstraint>,
    iterations: Vec<u64>,
}

/// Independent-columns base model with call counters
#[derive(Debug, Default)]
pub struct StubBaseModel {
    deterministic: bool,
    next_id: AtomicU64,
    models: Mutex<HashMap<BaseModelId, StubModel>>,
    pub dropped: Mutex<Vec<BaseModelId>>,
    /// Calls to simulate, column_value_probability and column_dependence_probability
    pub query_calls: AtomicUsize,
    pub imputation_calls: AtomicUsize,
    /// Columns passed to the last row_similarity call
    pub similarity_columns: Mutex<Vec<ColNo>>,
    /// When set, initialize and drop_model fail without changing anything
    pub refuse_changes: AtomicBool,
}

impl StubBaseModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Categorical draws cycle through the categories and numerical draws
    /// return the mean, ignoring the random stream
    pub fn deterministic() -> Self {
        Self {
            deterministic: true,
            ..Self::default()
        }
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn model_count(&self) -> usize {
        self.models.lock().len()
    }

    pub fn iterations(&self, id: BaseModelId) -> Vec<u64> {
        self.models
            .lock()
            .get(&id)
            .map(|m| m.iterations.clone())
            .unwrap_or_default()
    }

    fn check_accepting(&self) -> Result<()> {
        if self.refuse_changes.load(Ordering::SeqCst) {
            return Err(ComposerError::base_model("base model is read-only"));
        }
        Ok(())
    }

    fn with_model<T>(&self, id: BaseModelId, f: impl FnOnce(&mut StubModel) -> Result<T>) -> Result<T> {
        let mut models = self.models.lock();
        let model = models
            .get_mut(&id)
            .ok_or_else(|| ComposerError::base_model(format!("no base model {id}")))?;
        f(model)
    }
}

impl BaseModel for StubBaseModel {
    fn create(
        &self,
        _name: &str,
        table: &Table,
        columns: &[ColumnSpec],
        dependencies: &[DependencyConstraint],
    ) -> Result<BaseModelId> {
        let marginals = columns
            .iter()
            .map(|c| Marginal::learn(table, c))
            .collect::<Result<Vec<_>>>()?;
        let id = BaseModelId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.models.lock().insert(
            id,
            StubModel {
                columns: columns.to_vec(),
                marginals,
                table: table.clone(),
                dependencies: dependencies.to_vec(),
                iterations: Vec::new(),
            },
        );
        Ok(id)
    }

    fn drop_model(&self, id: BaseModelId) -> Result<()> {
        self.check_accepting()?;
        self.models
            .lock()
            .remove(&id)
            .ok_or_else(|| ComposerError::base_model(format!("no base model {id}")))?;
        self.dropped.lock().push(id);
        Ok(())
    }

    fn initialize(&self, id: BaseModelId, replicates: usize) -> Result<()> {
        self.check_accepting()?;
        self.with_model(id, |m| {
            m.iterations.extend(std::iter::repeat_n(0, replicates));
            Ok(())
        })
    }

    fn analyze(
        &self,
        id: BaseModelId,
        replicates: Option<&[usize]>,
        iterations: u32,
        _max_duration: Option<Duration>,
    ) -> Result<()> {
        self.with_model(id, |m| {
            let selected: Vec<usize> = match replicates {
                Some(list) => list.to_vec(),
                None => (0..m.iterations.len()).collect(),
            };
            for r in selected {
                let slot = m
                    .iterations
                    .get_mut(r)
                    .ok_or_else(|| ComposerError::base_model(format!("no replicate {r}")))?;
                *slot += u64::from(iterations);
            }
            Ok(())
        })
    }

    fn replicate_count(&self, id: BaseModelId) -> Result<usize> {
        self.with_model(id, |m| Ok(m.iterations.len()))
    }

    fn column_number(&self, id: BaseModelId, name: &str) -> Result<ColNo> {
        self.with_model(id, |m| {
            m.columns
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| ComposerError::ColumnNotFound(name.to_string()))
        })
    }

    fn column_name(&self, id: BaseModelId, colno: ColNo) -> Result<String> {
        self.with_model(id, |m| {
            m.columns
                .get(colno)
                .map(|c| c.name.clone())
                .ok_or_else(|| ComposerError::ColumnNotFound(colno.to_string()))
        })
    }

    fn column_stattype(&self, id: BaseModelId, colno: ColNo) -> Result<StatType> {
        self.with_model(id, |m| {
            m.columns
                .get(colno)
                .map(|c| c.stattype)
                .ok_or_else(|| ComposerError::ColumnNotFound(colno.to_string()))
        })
    }

    fn simulate(
        &self,
        id: BaseModelId,
        _replicate: Option<usize>,
        _evidence: &[Pin],
        targets: &[ColNo],
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<Value>>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let deterministic = self.deterministic;
        self.with_model(id, |m| {
            (0..n)
                .map(|i| {
                    targets
                        .iter()
                        .map(|t| {
                            let marginal = m
                                .marginals
                                .get(*t)
                                .ok_or_else(|| ComposerError::ColumnNotFound(t.to_string()))?;
                            Ok(marginal.draw(i, deterministic, rng))
                        })
                        .collect()
                })
                .collect()
        })
    }

    fn column_value_probability(
        &self,
        id: BaseModelId,
        _replicate: Option<usize>,
        colno: ColNo,
        value: &Value,
        evidence: &[Pin],
    ) -> Result<f64> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((_, fixed)) = evidence.iter().find(|(c, _)| *c == colno) {
            return Ok(if fixed == value { 1.0 } else { 0.0 });
        }
        self.with_model(id, |m| {
            m.marginals
                .get(colno)
                .map(|marginal| marginal.probability(value))
                .ok_or_else(|| ComposerError::ColumnNotFound(colno.to_string()))
        })
    }

    fn column_dependence_probability(
        &self,
        id: BaseModelId,
        _replicate: Option<usize>,
        a: ColNo,
        b: ColNo,
    ) -> Result<f64> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.with_model(id, |m| {
            let (na, nb) = (&m.columns[a].name, &m.columns[b].name);
            let dependent = m.dependencies.iter().any(|constraint| {
                constraint.dependent
                    && constraint.columns.contains(na)
                    && constraint.columns.contains(nb)
            });
            Ok(if a == b || dependent { 1.0 } else { 0.0 })
        })
    }

    fn row_similarity(
        &self,
        id: BaseModelId,
        _replicate: Option<usize>,
        rowid: RowId,
        other: RowId,
        columns: &[ColNo],
    ) -> Result<f64> {
        *self.similarity_columns.lock() = columns.to_vec();
        self.with_model(id, |m| {
            let mut same = 0usize;
            for colno in columns {
                let name = &m.columns[*colno].name;
                m.table.require_row(rowid)?;
                m.table.require_row(other)?;
                if m.table.cell(rowid, name) == m.table.cell(other, name) {
                    same += 1;
                }
            }
            Ok(same as f64 / columns.len().max(1) as f64)
        })
    }

    fn predict_confidence(
        &self,
        id: BaseModelId,
        _replicate: Option<usize>,
        colno: ColNo,
        rowid: RowId,
    ) -> Result<(Value, f64)> {
        self.imputation_calls.fetch_add(1, Ordering::SeqCst);
        self.with_model(id, |m| {
            m.table.require_row(rowid)?;
            m.marginals
                .get(colno)
                .map(Marginal::mode)
                .ok_or_else(|| ComposerError::ColumnNotFound(colno.to_string()))
        })
    }
}
