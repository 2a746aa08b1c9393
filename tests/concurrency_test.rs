mod helpers;

use helpers::{populate, test_store, test_vector};
use tiergraph::config::{FoldingConfig, LayoutConfig};
use tiergraph::graph::{EdgeKind, PassControl};
use tiergraph::{StoreError, TensorGraphStore};

/// Prune `victim` from inside a pass's progress hook, renumbering the store
/// between the compute and commit phases.
fn compact_away<'a>(store: &'a TensorGraphStore, victim: &'a str) -> impl Fn(usize, usize) + Sync + 'a {
    move |_, _| {
        if store.contains(victim).unwrap() {
            store.set_mass(victim, 0.0).unwrap();
            store.apply_metabolism(0.0, 0.1).unwrap();
        }
    }
}

#[test]
fn layout_refuses_to_commit_after_compaction() {
    let store = test_store();
    for (i, id) in ["a", "b", "c"].iter().enumerate() {
        store
            .add_node(id, Some(&test_vector(0)), Some(&[i as f32 * 3.0, 0.0, 0.0, 0.0]), None)
            .unwrap();
    }
    let hook = compact_away(&store, "a");
    let control = PassControl {
        cancel: None,
        progress: Some(&hook),
    };

    let err = store
        .apply_gravity(&LayoutConfig::default(), &[], control)
        .unwrap_err();
    assert!(matches!(err, StoreError::Concurrent { started: 0, current: 1 }), "got {err}");

    assert_eq!(store.ids().unwrap(), vec!["b", "c"]);
    assert_eq!(store.node("b").unwrap().unwrap().position, [3.0, 0.0, 0.0, 0.0]);
    assert_eq!(store.node("c").unwrap().unwrap().position, [6.0, 0.0, 0.0, 0.0]);
}

#[test]
fn similarity_pass_refuses_to_commit_after_compaction() {
    let store = test_store();
    populate(&store, &["a", "b", "c", "d"]);
    store.add_edge("b", "c", 0.5).unwrap();
    let hook = compact_away(&store, "a");
    let control = PassControl {
        cancel: None,
        progress: Some(&hook),
    };

    let err = store.ignite_gravity(2, 2, control).unwrap_err();
    assert!(matches!(err, StoreError::Concurrent { started: 0, current: 1 }), "got {err}");

    let edges = store.edges().unwrap();
    assert_eq!(edges.len(), 1, "only the explicit edge survives");
    assert_eq!(edges[0].kind, EdgeKind::Explicit);
    assert_eq!((edges[0].source.as_str(), edges[0].target.as_str()), ("b", "c"));
}

#[test]
fn fold_pass_refuses_to_commit_after_compaction() {
    let store = test_store();
    store.add_node("a", None, Some(&[1.0, 0.0, 0.0, 0.0]), None).unwrap();
    store.add_node("b", None, Some(&[19.0, 0.0, 0.0, 0.0]), None).unwrap();
    store.add_node("c", None, Some(&[1.0, 0.0, 0.0, 0.0]), None).unwrap();
    let hook = compact_away(&store, "c");
    let control = PassControl {
        cancel: None,
        progress: Some(&hook),
    };

    let err = store
        .fold_space(&FoldingConfig::default(), control)
        .unwrap_err();
    assert!(matches!(err, StoreError::Concurrent { started: 0, current: 1 }), "got {err}");
    assert!(store.raw_edges().unwrap().is_empty(), "no wormholes committed");

    // Without interference the same store links a and b.
    let report = store.fold_space(&FoldingConfig::default(), PassControl::none()).unwrap();
    assert_eq!(report.wormholes_added, 1);
}

#[test]
fn passes_commit_when_nothing_is_removed() {
    let store = test_store();
    populate(&store, &["a", "b", "c"]);
    // Hook mutates without compacting: generation stays put, commit goes ahead.
    let hook = |_: usize, _: usize| {
        store.set_mass("a", 2.0).unwrap();
    };
    let control = PassControl {
        cancel: None,
        progress: Some(&hook),
    };

    let report = store.ignite_gravity(1, 1, control).unwrap();
    assert_eq!(report.edges, 3);
    assert_eq!(store.generation().unwrap(), 0);
}
