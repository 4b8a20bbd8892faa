//! Read-only view of one composite model assembled from persisted records

use crate::graph::DependencyGraph;
use crate::store::{PredictorAssignmentRecord, StoreState};
use composer_core::{
    BaseModel, BaseModelId, ColNo, ColumnSpec, ComposerError, ModelId, Pin, Result, StatType,
    casefold,
};
use std::collections::HashMap;

/// Structure of a composite model as seen by the inference engine
#[derive(Debug, Clone)]
pub struct CompositeModel {
    pub id: ModelId,
    pub name: String,
    pub table: String,
    pub base: BaseModelId,
    columns: Vec<ColumnSpec>,
    graph: DependencyGraph,
    /// Composite column number → base-model column number, local columns only
    base_colnos: HashMap<ColNo, ColNo>,
    assignments: HashMap<ColNo, PredictorAssignmentRecord>,
    replicates: usize,
}

impl CompositeModel {
    /// Assemble the view of model `id` from a store snapshot
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotFound` if the model has no records, or
    /// the base model's error if a local column cannot be translated
    pub fn load(state: &StoreState, id: ModelId, base: &dyn BaseModel) -> Result<Self> {
        let header = state.model(id)?;
        let base_id = state.base_link(id)?;

        let mut local = Vec::new();
        let mut foreign = Vec::new();
        for record in state.ownership_of(id) {
            if record.local {
                local.push(record.colno);
            } else {
                foreign.push(record.colno);
            }
        }

        let mut base_colnos = HashMap::with_capacity(local.len());
        for colno in &local {
            let spec = header.columns.get(*colno).ok_or_else(|| {
                ComposerError::ColumnNotFound(format!("{colno} in model {}", header.name))
            })?;
            base_colnos.insert(*colno, base.column_number(base_id, &spec.name)?);
        }

        let graph = DependencyGraph::new(
            local,
            foreign,
            state.parents_of(id).map(|edge| (edge.child, edge.parent)),
            state.order_of(id),
        );

        Ok(Self {
            id,
            name: header.name.clone(),
            table: header.table.clone(),
            base: base_id,
            columns: header.columns.clone(),
            graph,
            base_colnos,
            assignments: state
                .assignments_of(id)
                .map(|record| (record.colno, record.clone()))
                .collect(),
            replicates: state.replicates_of(id).len(),
        })
    }

    /// Columns indexed by column number
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Number of replicates recorded for the model
    #[must_use]
    pub fn replicates(&self) -> usize {
        self.replicates
    }

    /// Column number of a column name
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ColumnNotFound` if the name is not a column
    pub fn column_number(&self, name: &str) -> Result<ColNo> {
        let name = casefold(name);
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or(ComposerError::ColumnNotFound(name))
    }

    /// Column spec of a column number
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ColumnNotFound` if the number is out of range
    pub fn column(&self, colno: ColNo) -> Result<&ColumnSpec> {
        self.columns.get(colno).ok_or_else(|| {
            ComposerError::ColumnNotFound(format!("{colno} in model {}", self.name))
        })
    }

    /// Case-folded name of a column
    ///
    /// # Errors
    ///
    /// See [`CompositeModel::column`]
    pub fn column_name(&self, colno: ColNo) -> Result<&str> {
        Ok(self.column(colno)?.name.as_str())
    }

    /// Declared stattype of a column
    ///
    /// # Errors
    ///
    /// See [`CompositeModel::column`]
    pub fn stattype(&self, colno: ColNo) -> Result<StatType> {
        Ok(self.column(colno)?.stattype)
    }

    /// Base-model column number of a local column
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::InvalidArgument` for a foreign column
    pub fn base_colno(&self, colno: ColNo) -> Result<ColNo> {
        self.base_colnos.get(&colno).copied().ok_or_else(|| {
            ComposerError::invalid(format!(
                "Column {colno} of model {} is not modeled by the base model",
                self.name
            ))
        })
    }

    /// Translate local column numbers to the base model's numbering
    ///
    /// # Errors
    ///
    /// See [`CompositeModel::base_colno`]
    pub fn to_base_columns(&self, columns: &[ColNo]) -> Result<Vec<ColNo>> {
        columns.iter().map(|c| self.base_colno(*c)).collect()
    }

    /// Translate local pins to the base model's numbering
    ///
    /// # Errors
    ///
    /// See [`CompositeModel::base_colno`]
    pub fn to_base_pins(&self, pins: &[Pin]) -> Result<Vec<Pin>> {
        pins.iter()
            .map(|(colno, value)| Ok((self.base_colno(*colno)?, value.clone())))
            .collect()
    }

    /// Persisted predictor assignment of a foreign column
    #[must_use]
    pub fn assignment(&self, colno: ColNo) -> Option<&PredictorAssignmentRecord> {
        self.assignments.get(&colno)
    }

    /// Check that every column number is in range
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ColumnNotFound` for the first unknown column
    pub fn check_columns(&self, columns: impl IntoIterator<Item = ColNo>) -> Result<()> {
        for colno in columns {
            self.column(colno)?;
        }
        Ok(())
    }

    /// Replicates a query should cover
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotInitialized` if the model has no
    /// replicates, or `ComposerError::InvalidArgument` if the selected
    /// replicate does not exist
    pub fn select_replicates(&self, replicate: Option<usize>) -> Result<Vec<usize>> {
        if self.replicates == 0 {
            return Err(ComposerError::ModelNotInitialized(self.name.clone()));
        }
        match replicate {
            Some(r) if r >= self.replicates => Err(ComposerError::invalid(format!(
                "Replicate {r} out of range, model {} has {} replicates",
                self.name, self.replicates
            ))),
            Some(r) => Ok(vec![r]),
            None => Ok((0..self.replicates).collect()),
        }
    }
}
