//! Foreign predictor builders used by the integration tests
//!
//! Trained predictors serialize to JSON so the tests exercise the
//! persist/deserialize path the engine uses.

use composer_core::{
    ColumnSpec, ComposerError, Conditions, Predictor, PredictorBuilder, Result, Table, Value,
};
use rand::RngCore;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Call counters shared by a builder and every predictor it produced
#[derive(Debug, Default)]
pub struct Counters {
    pub trained: AtomicUsize,
    pub deserialized: AtomicUsize,
    pub calls: AtomicUsize,
}

impl Counters {
    pub fn trained(&self) -> usize {
        self.trained.load(Ordering::SeqCst)
    }

    pub fn deserialized(&self) -> usize {
        self.deserialized.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn uniform(rng: &mut dyn RngCore) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

fn downcast<T: 'static>(predictor: &dyn Predictor) -> Result<&T> {
    predictor
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ComposerError::predictor("predictor built by another builder"))
}

fn condition<'a>(conditions: &'a Conditions, name: &str) -> Result<&'a Value> {
    conditions
        .get(name)
        .ok_or_else(|| ComposerError::predictor(format!("missing condition \"{name}\"")))
}

// ---------------------------------------------------------------------------
// Constant

#[derive(Debug, Serialize, Deserialize)]
pub struct ConstantPredictor {
    value: Value,
    #[serde(skip)]
    counters: Arc<Counters>,
}

impl Predictor for ConstantPredictor {
    fn simulate(&self, n: usize, _: &Conditions, _: &mut dyn RngCore) -> Result<Vec<Value>> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.value.clone(); n])
    }

    fn logpdf(&self, value: &Value, _: &Conditions) -> Result<f64> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        Ok(if *value == self.value { 0.0 } else { f64::NEG_INFINITY })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Always predicts the same value, whatever the parents
pub struct ConstantBuilder {
    value: Value,
    pub counters: Arc<Counters>,
}

impl ConstantBuilder {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            counters: Arc::default(),
        }
    }
}

impl PredictorBuilder for ConstantBuilder {
    fn name(&self) -> &str {
        "constant"
    }

    fn create(&self, _: &Table, _: &[ColumnSpec], _: &[ColumnSpec]) -> Result<Box<dyn Predictor>> {
        self.counters.trained.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ConstantPredictor {
            value: self.value.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn serialize(&self, predictor: &dyn Predictor) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(downcast::<ConstantPredictor>(predictor)?)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Box<dyn Predictor>> {
        self.counters.deserialized.fetch_add(1, Ordering::SeqCst);
        let mut predictor: ConstantPredictor = serde_json::from_slice(bytes)?;
        predictor.counters = Arc::clone(&self.counters);
        Ok(Box::new(predictor))
    }
}

// ---------------------------------------------------------------------------
// Lookup: categorical target given categorical parents

#[derive(Debug, Serialize, Deserialize)]
pub struct LookupPredictor {
    parents: Vec<String>,
    /// Parent values joined by `|` → target frequencies
    table: Vec<(String, Vec<(Value, f64)>)>,
    #[serde(skip)]
    counters: Arc<Counters>,
}

impl LookupPredictor {
    fn distribution(&self, conditions: &Conditions) -> Result<&[(Value, f64)]> {
        let key = self
            .parents
            .iter()
            .map(|p| condition(conditions, p).map(ToString::to_string))
            .collect::<Result<Vec<_>>>()?
            .join("|");
        self.table
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, dist)| dist.as_slice())
            .ok_or_else(|| ComposerError::predictor(format!("unseen parent values \"{key}\"")))
    }
}

impl Predictor for LookupPredictor {
    fn simulate(&self, n: usize, conditions: &Conditions, rng: &mut dyn RngCore) -> Result<Vec<Value>> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        let dist = self.distribution(conditions)?;
        let index = WeightedIndex::new(dist.iter().map(|(_, p)| *p))
            .map_err(|e| ComposerError::predictor(e.to_string()))?;
        Ok((0..n).map(|_| dist[index.sample(rng)].0.clone()).collect())
    }

    fn logpdf(&self, value: &Value, conditions: &Conditions) -> Result<f64> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        let p = self
            .distribution(conditions)?
            .iter()
            .find(|(v, _)| v == value)
            .map_or(0.0, |(_, p)| *p);
        Ok(p.ln())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Conditional frequency table learned from the training rows
#[derive(Default)]
pub struct LookupBuilder {
    pub counters: Arc<Counters>,
}

impl PredictorBuilder for LookupBuilder {
    fn name(&self) -> &str {
        "lookup"
    }

    fn create(
        &self,
        table: &Table,
        targets: &[ColumnSpec],
        conditions: &[ColumnSpec],
    ) -> Result<Box<dyn Predictor>> {
        self.counters.trained.fetch_add(1, Ordering::SeqCst);
        let target = &targets[0].name;
        let parents: Vec<String> = conditions.iter().map(|c| c.name.clone()).collect();

        let mut counts: Vec<(String, Vec<(Value, f64)>)> = Vec::new();
        for (rowid, _) in table.rows() {
            let Some(value) = table.cell(rowid, target) else {
                continue;
            };
            let key: Option<Vec<String>> = parents
                .iter()
                .map(|p| table.cell(rowid, p).map(ToString::to_string))
                .collect();
            let Some(key) = key.map(|k| k.join("|")) else {
                continue;
            };
            let slot = match counts.iter().position(|(k, _)| *k == key) {
                Some(slot) => slot,
                None => {
                    counts.push((key, Vec::new()));
                    counts.len() - 1
                }
            };
            let dist = &mut counts[slot].1;
            match dist.iter_mut().find(|(v, _)| v == value) {
                Some((_, count)) => *count += 1.0,
                None => dist.push((value.clone(), 1.0)),
            }
        }
        for (_, dist) in &mut counts {
            let total: f64 = dist.iter().map(|(_, c)| c).sum();
            for (_, c) in dist.iter_mut() {
                *c /= total;
            }
        }

        Ok(Box::new(LookupPredictor {
            parents,
            table: counts,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn serialize(&self, predictor: &dyn Predictor) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(downcast::<LookupPredictor>(predictor)?)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Box<dyn Predictor>> {
        self.counters.deserialized.fetch_add(1, Ordering::SeqCst);
        let mut predictor: LookupPredictor = serde_json::from_slice(bytes)?;
        predictor.counters = Arc::clone(&self.counters);
        Ok(Box::new(predictor))
    }
}

// ---------------------------------------------------------------------------
// Linear: numerical target given one numerical parent

#[derive(Debug, Serialize, Deserialize)]
pub struct LinearPredictor {
    parent: String,
    intercept: f64,
    slope: f64,
    sd: f64,
    #[serde(skip)]
    counters: Arc<Counters>,
}

impl LinearPredictor {
    fn mean(&self, conditions: &Conditions) -> Result<f64> {
        let x = condition(conditions, &self.parent)?
            .as_f64()
            .ok_or_else(|| ComposerError::predictor("parent is not numerical"))?;
        Ok(self.intercept + self.slope * x)
    }
}

impl Predictor for LinearPredictor {
    fn simulate(&self, n: usize, conditions: &Conditions, rng: &mut dyn RngCore) -> Result<Vec<Value>> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        let mean = self.mean(conditions)?;
        Ok((0..n)
            .map(|_| {
                let u1 = uniform(rng).max(f64::MIN_POSITIVE);
                let u2 = uniform(rng);
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
                Value::Number(mean + self.sd * z)
            })
            .collect())
    }

    fn logpdf(&self, value: &Value, conditions: &Conditions) -> Result<f64> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        let Some(y) = value.as_f64() else {
            return Ok(f64::NEG_INFINITY);
        };
        let mean = self.mean(conditions)?;
        Ok(-0.5 * ((2.0 * PI * self.sd * self.sd).ln() + ((y - mean) / self.sd).powi(2)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Least-squares line through the training rows
#[derive(Default)]
pub struct LinearBuilder {
    pub counters: Arc<Counters>,
}

impl PredictorBuilder for LinearBuilder {
    fn name(&self) -> &str {
        "linear"
    }

    fn create(
        &self,
        table: &Table,
        targets: &[ColumnSpec],
        conditions: &[ColumnSpec],
    ) -> Result<Box<dyn Predictor>> {
        self.counters.trained.fetch_add(1, Ordering::SeqCst);
        let [parent] = conditions else {
            return Err(ComposerError::predictor("linear needs exactly one parent"));
        };
        let target = &targets[0].name;
        let points: Vec<(f64, f64)> = table
            .rows()
            .filter_map(|(rowid, _)| {
                let x = table.cell(rowid, &parent.name)?.as_f64()?;
                let y = table.cell(rowid, target)?.as_f64()?;
                Some((x, y))
            })
            .collect();
        let n = points.len() as f64;
        let mx = points.iter().map(|p| p.0).sum::<f64>() / n;
        let my = points.iter().map(|p| p.1).sum::<f64>() / n;
        let sxy: f64 = points.iter().map(|(x, y)| (x - mx) * (y - my)).sum();
        let sxx: f64 = points.iter().map(|(x, _)| (x - mx).powi(2)).sum();
        let slope = sxy / sxx;
        let intercept = my - slope * mx;
        let residual = points
            .iter()
            .map(|(x, y)| (y - intercept - slope * x).powi(2))
            .sum::<f64>()
            / n;

        Ok(Box::new(LinearPredictor {
            parent: parent.name.clone(),
            intercept,
            slope,
            sd: residual.sqrt().max(1e-3),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn serialize(&self, predictor: &dyn Predictor) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(downcast::<LinearPredictor>(predictor)?)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Box<dyn Predictor>> {
        self.counters.deserialized.fetch_add(1, Ordering::SeqCst);
        let mut predictor: LinearPredictor = serde_json::from_slice(bytes)?;
        predictor.counters = Arc::clone(&self.counters);
        Ok(Box::new(predictor))
    }
}
