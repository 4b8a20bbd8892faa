//! Confidence-scored imputation of single cells

use super::InferenceEngine;
use crate::model::CompositeModel;
use crate::stats::{mean, mode};
use composer_core::{
    ColNo, ComposerError, Conditions, ModelId, Pin, Result, RowId, StatType, Table, Value,
};
use tracing::debug;

impl InferenceEngine {
    /// Impute `colno` in row `rowid` and report a confidence in `[0, 1]`
    ///
    /// Local columns that no foreign column depends on (or whose foreign
    /// children are all missing in the row) are imputed by the base model.
    /// Otherwise the value is the mode (categorical) or mean (numerical) of
    /// posterior samples, scaled by the lowest confidence of any parent that
    /// had to be imputed first.
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::RowNotFound` if the row does not exist in the
    /// model's table
    pub fn predict_confidence(
        &self,
        model: ModelId,
        replicate: Option<usize>,
        colno: ColNo,
        rowid: RowId,
    ) -> Result<(Value, f64)> {
        let model = self.ctx.model(model)?;
        model.check_columns([colno])?;
        model.select_replicates(replicate)?;
        let table = self.ctx.table(&model.table)?;
        let row = row_values(&model, &table, rowid)?;
        self.impute(&model, replicate, colno, rowid, &row)
    }

    fn impute(
        &self,
        model: &CompositeModel,
        replicate: Option<usize>,
        colno: ColNo,
        rowid: RowId,
        row: &[Option<Value>],
    ) -> Result<(Value, f64)> {
        let graph = model.graph();
        let n = self.clamp_samples(self.ctx.config().imputation.n_samples)?;
        let stattype = model.stattype(colno)?;

        if graph.is_local(colno) {
            let observed_children = graph
                .children(colno)
                .into_iter()
                .any(|child| row[child].is_some());
            if !observed_children {
                debug!(model = %model.id, colno, rowid, "imputation delegated to base model");
                return self.ctx.base.predict_confidence(
                    model.base,
                    replicate,
                    model.base_colno(colno)?,
                    rowid,
                );
            }

            let evidence: Vec<Pin> = row
                .iter()
                .enumerate()
                .filter(|(c, _)| *c != colno)
                .filter_map(|(c, value)| value.clone().map(|v| (c, v)))
                .collect();
            let samples: Vec<Value> = self
                .simulate_model(model, replicate, &evidence, &[colno], n)?
                .into_iter()
                .filter_map(|mut sample| sample.pop())
                .collect();

            return match stattype {
                StatType::Categorical => mode(&samples)
                    .ok_or_else(|| ComposerError::invalid("no posterior samples drawn")),
                StatType::Numerical => self.summarize_numerical(&samples),
            };
        }

        let mut conditions = Conditions::new();
        let mut parent_confidence: f64 = 1.0;
        for parent in graph.parents(colno) {
            let value = match &row[*parent] {
                Some(value) => value.clone(),
                None => {
                    let (value, confidence) = self.impute(model, replicate, *parent, rowid, row)?;
                    parent_confidence = parent_confidence.min(confidence);
                    value
                }
            };
            conditions.insert(model.column_name(*parent)?.to_string(), value);
        }

        let predictor = self.ctx.predictor(model, colno)?;
        let mut rng = self.ctx.fork_rng();
        let samples = predictor.simulate(n, &conditions, &mut rng)?;

        let (value, confidence) = match stattype {
            StatType::Categorical => {
                let (value, _) = mode(&samples)
                    .ok_or_else(|| ComposerError::predictor("simulate returned no values"))?;
                let density = predictor.logpdf(&value, &conditions)?.exp();
                (value, density.clamp(0.0, 1.0))
            }
            StatType::Numerical => self.summarize_numerical(&samples)?,
        };
        Ok((value, confidence * parent_confidence))
    }

    fn summarize_numerical(&self, samples: &[Value]) -> Result<(Value, f64)> {
        let numbers = samples
            .iter()
            .map(|value| {
                value.as_f64().ok_or_else(|| {
                    ComposerError::invalid(format!("numerical column sampled label \"{value}\""))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        let estimate =
            mean(&numbers).ok_or_else(|| ComposerError::invalid("no posterior samples drawn"))?;
        let confidence = self.ctx.estimator.confidence(&numbers)?;
        Ok((Value::Number(estimate), confidence))
    }
}

/// Cells of a table row rearranged by composite column number
fn row_values(model: &CompositeModel, table: &Table, rowid: RowId) -> Result<Vec<Option<Value>>> {
    let row = table.require_row(rowid)?;
    model
        .columns()
        .iter()
        .map(|column| {
            let index = table.column_index(&column.name).ok_or_else(|| {
                ComposerError::ColumnNotFound(format!("{} in table {}", column.name, table.name()))
            })?;
            Ok(row[index].clone())
        })
        .collect()
}
