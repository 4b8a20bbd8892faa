//! Property-based tests for foreign-column scheduling
//!
//! Random acyclic graphs must always be scheduled with every node after its
//! predecessors; rings must always be reported as cycles.

use composer_core::ComposerError;
use composer_service::graph::topological_sort;
use proptest::prelude::*;
use std::collections::HashMap;

// Strategy: an acyclic graph whose node i only depends on nodes below i,
// presented in shuffled order
fn acyclic_graph() -> impl Strategy<Value = Vec<(usize, Vec<usize>)>> {
    (1usize..24)
        .prop_flat_map(|n| {
            let preds = (0..n)
                .map(|i| prop::collection::vec(any::<prop::sample::Index>(), 0..4).prop_map(move |picks| {
                    let mut preds: Vec<usize> = if i == 0 {
                        Vec::new()
                    } else {
                        picks.iter().map(|p| p.index(i)).collect()
                    };
                    preds.sort_unstable();
                    preds.dedup();
                    (i, preds)
                }))
                .collect::<Vec<_>>();
            preds
        })
        .prop_shuffle()
}

proptest! {
    #[test]
    fn prop_order_respects_predecessors(graph in acyclic_graph()) {
        let n = graph.len();
        let sorted = topological_sort(graph).expect("acyclic graph must sort");
        prop_assert_eq!(sorted.len(), n);

        let position: HashMap<usize, usize> = sorted
            .iter()
            .enumerate()
            .map(|(pos, (node, _))| (*node, pos))
            .collect();
        prop_assert_eq!(position.len(), n);
        for (node, preds) in &sorted {
            for pred in preds {
                prop_assert!(position[pred] < position[node], "{} scheduled before {}", node, pred);
            }
        }
    }

    #[test]
    fn prop_rings_are_cycles(size in 2usize..8) {
        let ring: Vec<(usize, Vec<usize>)> = (0..size).map(|i| (i, vec![(i + 1) % size])).collect();
        match topological_sort(ring) {
            Err(ComposerError::CyclicDependency { nodes }) => prop_assert_eq!(nodes.len(), size),
            other => prop_assert!(false, "expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn prop_external_predecessors_never_block(
        internal in prop::collection::vec(0usize..100, 1..10),
        external in prop::collection::vec(100usize..200, 0..5),
    ) {
        let mut nodes = internal;
        nodes.sort_unstable();
        nodes.dedup();
        let graph: Vec<(usize, Vec<usize>)> =
            nodes.iter().map(|node| (*node, external.clone())).collect();

        let sorted = topological_sort(graph).expect("external predecessors are ignored");
        let order: Vec<usize> = sorted.into_iter().map(|(node, _)| node).collect();
        prop_assert_eq!(order, nodes);
    }
}

#[test]
fn test_cycle_behind_acyclic_prefix() {
    let graph = vec![
        ("a".to_string(), vec![]),
        ("b".to_string(), vec!["a".to_string(), "c".to_string()]),
        ("c".to_string(), vec!["b".to_string()]),
    ];
    match topological_sort(graph) {
        Err(ComposerError::CyclicDependency { nodes }) => {
            assert_eq!(nodes, vec!["b".to_string(), "c".to_string()]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}
