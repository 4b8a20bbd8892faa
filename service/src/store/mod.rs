//! Persisted composite model state
//!
//! The records mirror the durable layout of a composite model: ownership,
//! parent edges, topological order, predictor assignments, base-model linkage
//! and replicate accounting. Every mutation goes through
//! [`CompositeStore::transact`], which commits all or nothing.

pub mod memory;

pub use memory::InMemoryStore;

use composer_core::{BaseModelId, ColNo, ColumnSpec, ComposerError, ModelId, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name, table and columns of a composite model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHeader {
    pub id: ModelId,
    pub name: String,
    pub table: String,
    /// Columns indexed by column number
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub model: ModelId,
    pub colno: ColNo,
    pub local: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentEdgeRecord {
    pub model: ModelId,
    pub child: ColNo,
    pub parent: ColNo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub model: ModelId,
    pub colno: ColNo,
    pub rank: usize,
}

/// Builder name and trained bytes of one foreign column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorAssignmentRecord {
    pub model: ModelId,
    pub colno: ColNo,
    pub builder: String,
    /// `None` until the model is initialized
    pub trained: Option<Arc<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseModelLink {
    pub model: ModelId,
    pub base: BaseModelId,
}

/// Iteration accounting for one replicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateRecord {
    pub model: ModelId,
    pub replicate: usize,
    pub iterations: u64,
}

/// Every persisted record, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    pub next_model_id: u64,
    pub models: Vec<ModelHeader>,
    pub base_links: Vec<BaseModelLink>,
    pub ownership: Vec<OwnershipRecord>,
    pub parents: Vec<ParentEdgeRecord>,
    pub order: Vec<OrderRecord>,
    pub assignments: Vec<PredictorAssignmentRecord>,
    pub replicates: Vec<ReplicateRecord>,
}

impl StoreState {
    /// Reserve the next model id
    pub fn allocate_model_id(&mut self) -> ModelId {
        let id = ModelId(self.next_model_id);
        self.next_model_id += 1;
        id
    }

    /// Header of a model
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotFound` if the model does not exist
    pub fn model(&self, id: ModelId) -> Result<&ModelHeader> {
        self.models
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| ComposerError::ModelNotFound(id.to_string()))
    }

    /// Header of a model looked up by name
    #[must_use]
    pub fn model_by_name(&self, name: &str) -> Option<&ModelHeader> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Base model backing a composite model
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::ModelNotFound` if no linkage exists
    pub fn base_link(&self, id: ModelId) -> Result<BaseModelId> {
        self.base_links
            .iter()
            .find(|l| l.model == id)
            .map(|l| l.base)
            .ok_or_else(|| ComposerError::ModelNotFound(id.to_string()))
    }

    pub fn ownership_of(&self, id: ModelId) -> impl Iterator<Item = &OwnershipRecord> {
        self.ownership.iter().filter(move |r| r.model == id)
    }

    pub fn parents_of(&self, id: ModelId) -> impl Iterator<Item = &ParentEdgeRecord> {
        self.parents.iter().filter(move |r| r.model == id)
    }

    /// Foreign columns of a model sorted by rank
    #[must_use]
    pub fn order_of(&self, id: ModelId) -> Vec<ColNo> {
        let mut records: Vec<&OrderRecord> = self.order.iter().filter(|r| r.model == id).collect();
        records.sort_by_key(|r| r.rank);
        records.into_iter().map(|r| r.colno).collect()
    }

    pub fn assignments_of(&self, id: ModelId) -> impl Iterator<Item = &PredictorAssignmentRecord> {
        self.assignments.iter().filter(move |r| r.model == id)
    }

    /// Predictor assignment of one foreign column
    #[must_use]
    pub fn assignment(&self, id: ModelId, colno: ColNo) -> Option<&PredictorAssignmentRecord> {
        self.assignments
            .iter()
            .find(|r| r.model == id && r.colno == colno)
    }

    /// Replicate records of a model sorted by replicate number
    #[must_use]
    pub fn replicates_of(&self, id: ModelId) -> Vec<&ReplicateRecord> {
        let mut records: Vec<&ReplicateRecord> =
            self.replicates.iter().filter(|r| r.model == id).collect();
        records.sort_by_key(|r| r.replicate);
        records
    }

    /// Remove every record of a model and hand them back
    ///
    /// Returns `None` if the model has no header.
    pub fn take_model(&mut self, id: ModelId) -> Option<StoreState> {
        let position = self.models.iter().position(|m| m.id == id)?;
        let header = self.models.remove(position);
        Some(StoreState {
            next_model_id: self.next_model_id,
            models: vec![header],
            base_links: extract(&mut self.base_links, |r| r.model == id),
            ownership: extract(&mut self.ownership, |r| r.model == id),
            parents: extract(&mut self.parents, |r| r.model == id),
            order: extract(&mut self.order, |r| r.model == id),
            assignments: extract(&mut self.assignments, |r| r.model == id),
            replicates: extract(&mut self.replicates, |r| r.model == id),
        })
    }

    /// Put back records removed by [`StoreState::take_model`]
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::InvalidArgument` if a model with the same id
    /// or name exists again
    pub fn restore_model(&mut self, records: StoreState) -> Result<()> {
        for header in &records.models {
            if self.models.iter().any(|m| m.id == header.id || m.name == header.name) {
                return Err(ComposerError::invalid(format!(
                    "cannot restore model {}: {} is taken",
                    header.id, header.name
                )));
            }
        }
        self.models.extend(records.models);
        self.base_links.extend(records.base_links);
        self.ownership.extend(records.ownership);
        self.parents.extend(records.parents);
        self.order.extend(records.order);
        self.assignments.extend(records.assignments);
        self.replicates.extend(records.replicates);
        Ok(())
    }

    /// Whether any record of any kind references the model
    #[must_use]
    pub fn references(&self, id: ModelId) -> bool {
        self.models.iter().any(|m| m.id == id)
            || self.base_links.iter().any(|r| r.model == id)
            || self.ownership.iter().any(|r| r.model == id)
            || self.parents.iter().any(|r| r.model == id)
            || self.order.iter().any(|r| r.model == id)
            || self.assignments.iter().any(|r| r.model == id)
            || self.replicates.iter().any(|r| r.model == id)
    }
}

fn extract<T>(records: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> Vec<T> {
    let (taken, kept): (Vec<T>, Vec<T>) = std::mem::take(records).into_iter().partition(|r| matches(r));
    *records = kept;
    taken
}

/// Durable storage of composite model records
pub trait CompositeStore: Send + Sync {
    /// Consistent read-only view of every record
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read
    fn snapshot(&self) -> Result<Arc<StoreState>>;

    /// Apply `change` atomically: either all of its edits become visible or,
    /// if it returns an error, none do
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `change` or by the backing storage
    fn transact(&self, change: &mut dyn FnMut(&mut StoreState) -> Result<()>) -> Result<()>;
}
