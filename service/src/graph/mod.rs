//! Column ownership and parent graph of a composite model
//!
//! Local columns are resolved by the base model first (implicit rank −1);
//! foreign columns are evaluated in their persisted topological order.

pub mod toposort;

pub use toposort::topological_sort;

use composer_core::ColNo;
use std::collections::{BTreeSet, HashMap};

/// Read-only view of ownership, parent edges and evaluation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    local: BTreeSet<ColNo>,
    foreign: BTreeSet<ColNo>,
    parents: HashMap<ColNo, Vec<ColNo>>,
    order: Vec<ColNo>,
}

impl DependencyGraph {
    /// Assemble a graph from its parts
    ///
    /// Parent lists are sorted so iteration is deterministic.
    #[must_use]
    pub fn new(
        local: impl IntoIterator<Item = ColNo>,
        foreign: impl IntoIterator<Item = ColNo>,
        parents: impl IntoIterator<Item = (ColNo, ColNo)>,
        order: Vec<ColNo>,
    ) -> Self {
        let mut by_child: HashMap<ColNo, Vec<ColNo>> = HashMap::new();
        for (child, parent) in parents {
            by_child.entry(child).or_default().push(parent);
        }
        for list in by_child.values_mut() {
            list.sort_unstable();
            list.dedup();
        }
        Self {
            local: local.into_iter().collect(),
            foreign: foreign.into_iter().collect(),
            parents: by_child,
            order,
        }
    }

    /// Whether the column is modeled by the base model
    #[must_use]
    pub fn is_local(&self, colno: ColNo) -> bool {
        self.local.contains(&colno)
    }

    /// Whether the column is modeled by a foreign predictor
    #[must_use]
    pub fn is_foreign(&self, colno: ColNo) -> bool {
        self.foreign.contains(&colno)
    }

    /// Local columns in ascending order
    pub fn local(&self) -> impl Iterator<Item = ColNo> + '_ {
        self.local.iter().copied()
    }

    /// Foreign columns in ascending order
    pub fn foreign(&self) -> impl Iterator<Item = ColNo> + '_ {
        self.foreign.iter().copied()
    }

    /// Declared parents of a foreign column (empty for local columns)
    #[must_use]
    pub fn parents(&self, colno: ColNo) -> &[ColNo] {
        self.parents.get(&colno).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Foreign columns that name `colno` as a parent
    #[must_use]
    pub fn children(&self, colno: ColNo) -> Vec<ColNo> {
        self.order
            .iter()
            .copied()
            .filter(|child| self.parents(*child).contains(&colno))
            .collect()
    }

    /// Whether `parent` is a declared parent of `child`
    #[must_use]
    pub fn is_parent(&self, parent: ColNo, child: ColNo) -> bool {
        self.parents(child).contains(&parent)
    }

    /// Foreign columns in evaluation order
    #[must_use]
    pub fn order(&self) -> &[ColNo] {
        &self.order
    }

    /// Evaluation rank of a foreign column, `None` for local columns
    #[must_use]
    pub fn rank(&self, colno: ColNo) -> Option<usize> {
        self.order.iter().position(|c| *c == colno)
    }

    /// Whether any of `columns` is foreign
    #[must_use]
    pub fn touches_foreign(&self, columns: impl IntoIterator<Item = ColNo>) -> bool {
        columns.into_iter().any(|c| self.is_foreign(c))
    }
}
