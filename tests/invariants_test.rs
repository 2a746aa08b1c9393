mod helpers;

use helpers::{assert_consistent, populate, test_store, test_vector};
use std::sync::Arc;
use std::thread;
use tiergraph::StoreError;

#[test]
fn ids_and_indices_stay_bijective_through_compaction() {
    let store = test_store();
    populate(&store, &["a", "b", "c", "d", "e", "f"]);
    store.add_edge("a", "f", 1.0).unwrap();
    store.add_edge("c", "d", 1.0).unwrap();
    store.add_edge("f", "b", 1.0).unwrap();

    store.set_mass("b", 0.0).unwrap();
    store.set_mass("e", 0.0).unwrap();
    store.apply_metabolism(0.0, 0.1).unwrap();

    assert_consistent(&store);
    let ids = store.ids().unwrap();
    assert_eq!(ids, vec!["a", "c", "d", "f"], "survivors keep their relative order");
    for (i, id) in ids.iter().enumerate() {
        let node = store.node(id).unwrap().unwrap();
        assert_eq!(node.index, i, "indices are dense after compaction");
    }
    for edge in store.raw_edges().unwrap() {
        assert!(edge.source < ids.len() && edge.target < ids.len());
    }
}

#[test]
fn stale_handle_is_rejected_after_compaction() {
    let store = test_store();
    populate(&store, &["a", "b"]);
    let handle = store.handle_of("b").unwrap().unwrap();

    store.set_mass("a", 0.0).unwrap();
    store.apply_metabolism(0.0, 0.1).unwrap();

    let err = store.update_vector(handle, &test_vector(3)).unwrap_err();
    assert!(matches!(err, StoreError::StaleHandle { issued: 0, current: 1 }));

    let fresh = store.handle_of("b").unwrap().unwrap();
    assert_eq!(fresh.index(), 0);
    store.update_vector(fresh, &test_vector(3)).unwrap();
    assert_eq!(store.node("b").unwrap().unwrap().vector, test_vector(3));
}

#[test]
fn update_vector_reinforces_mass() {
    let store = test_store().with_reinforcement(0.25);
    populate(&store, &["a"]);
    let handle = store.handle_of("a").unwrap().unwrap();
    store.update_vector(handle, &test_vector(1)).unwrap();
    let mass = store.node("a").unwrap().unwrap().mass;
    assert!((mass - 1.25).abs() < 1e-6, "mass was {mass}");
}

#[test]
fn add_edge_creates_missing_endpoints() {
    let store = test_store();
    store.add_edge("x", "y", 0.5).unwrap();
    assert_eq!(store.len().unwrap(), 2);
    let node = store.node("y").unwrap().unwrap();
    assert_eq!(node.vector, vec![0.0; helpers::DIM]);
    assert_eq!(node.position, [0.0; 4]);
    assert_consistent(&store);
}

#[test]
fn invalid_ids_are_rejected() {
    let store = test_store();
    assert!(matches!(
        store.add_node("   ", None, None, None),
        Err(StoreError::InvalidId(_))
    ));
    assert!(matches!(
        store.add_edge("ok", "bad\nid", 1.0),
        Err(StoreError::InvalidId(_))
    ));
    assert!(store.is_empty().unwrap(), "nothing inserted on rejection");
}

#[test]
fn wrong_length_vectors_are_coerced_and_counted() {
    let store = test_store();
    store.add_node("short", Some(&[1.0, 2.0]), None, None).unwrap();
    store.add_node("long", Some(&[1.0; 20]), Some(&[1.0; 6]), None).unwrap();

    let short = store.node("short").unwrap().unwrap();
    assert_eq!(short.vector.len(), helpers::DIM);
    assert_eq!(&short.vector[..3], &[1.0, 2.0, 0.0]);
    assert_eq!(store.node("long").unwrap().unwrap().vector, vec![1.0; helpers::DIM]);
    assert_eq!(store.stats().unwrap().coercions, 3);
}

#[test]
fn concurrent_inserts_keep_store_consistent() {
    let store = Arc::new(test_store());
    let workers: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    let id = format!("t{t}-n{i}");
                    store.add_node(&id, Some(&test_vector(i)), None, None).unwrap();
                    if i > 0 {
                        store.add_edge(&id, &format!("t{t}-n{}", i - 1), 1.0).unwrap();
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(store.len().unwrap(), 200);
    assert_eq!(store.raw_edges().unwrap().len(), 4 * 49);
    assert_consistent(&store);
}

#[test]
fn k_nearest_excludes_the_query_node() {
    let store = test_store();
    populate(&store, &["a", "b", "c", "d"]);
    let near = store.k_nearest("b", 2).unwrap();
    let ids: Vec<&str> = near.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(near.len(), 2);
    assert!(!ids.contains(&"b"));
    assert!(ids.contains(&"a") && ids.contains(&"c"));
    assert!(matches!(store.k_nearest("zzz", 1), Err(StoreError::UnknownNode(_))));
}
