//! Topological scheduling of foreign columns

use composer_core::{ComposerError, Result};
use indexmap::IndexMap;
use std::fmt::Display;
use std::hash::Hash;

/// Topologically sort a graph given as an adjacency list of predecessors
///
/// Edges point from a node to its dependencies: `(10, [8, 7])` means 8 and 7
/// must come before 10. Predecessors that are not themselves keys of the
/// graph (local columns, for instance) never block a node.
///
/// The remaining nodes are scanned repeatedly in input order; a node is
/// emitted as soon as none of its predecessors remain.
///
/// # Errors
///
/// Returns `ComposerError::CyclicDependency` naming the unscheduled nodes if
/// a full scan makes no progress
pub fn topological_sort<K, I>(graph: I) -> Result<Vec<(K, Vec<K>)>>
where
    K: Clone + Eq + Hash + Display,
    I: IntoIterator<Item = (K, Vec<K>)>,
{
    let mut remaining: IndexMap<K, Vec<K>> = graph.into_iter().collect();
    let mut sorted = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let mut progressed = false;
        let nodes: Vec<K> = remaining.keys().cloned().collect();

        for node in nodes {
            let ready = remaining
                .get(&node)
                .is_some_and(|preds| preds.iter().all(|p| !remaining.contains_key(p)));
            if ready && let Some(preds) = remaining.shift_remove(&node) {
                sorted.push((node, preds));
                progressed = true;
            }
        }

        if !progressed {
            return Err(ComposerError::CyclicDependency {
                nodes: remaining.keys().map(ToString::to_string).collect(),
            });
        }
    }

    Ok(sorted)
}
