mod helpers;

use helpers::{test_store, test_vector};
use tiergraph::graph::{SnapshotCompressor, SEED_DIM};

#[test]
fn first_node_gets_an_empty_store_seed() {
    let store = test_store();
    store.add_node("first", Some(&test_vector(0)), Some(&[5.0, 5.0, 5.0, 5.0]), None).unwrap();
    let seed = store.node("first").unwrap().unwrap().snapshot_seed;
    assert_eq!(seed.len(), SEED_DIM);
    assert!(seed.iter().all(|x| *x == 0.0));
}

#[test]
fn seed_reflects_store_before_insert() {
    let store = test_store();
    store.add_node("a", Some(&test_vector(0)), Some(&[2.0, 0.0, 0.0, 0.0]), None).unwrap();
    store.add_node("b", Some(&test_vector(1)), Some(&[4.0, 0.0, 0.0, 0.0]), None).unwrap();
    store.add_node("c", Some(&test_vector(2)), None, None).unwrap();

    let seed = store.node("c").unwrap().unwrap().snapshot_seed;
    assert!((seed[0] - 0.5).abs() < 1e-6, "centroid of a and b");
    assert!((seed[1] - 0.5).abs() < 1e-6);
    assert_eq!(seed[2], 0.0, "c's own vector is not included");
    assert!((seed[30] - 0.25).abs() < 1e-6, "population variance");
    assert!((seed[60] - 3.0).abs() < 1e-6, "mean position");
}

#[test]
fn seed_reading_describes_the_context() {
    let store = test_store();
    for i in 0..3 {
        store
            .add_node(&format!("n{i}"), Some(&test_vector(0)), Some(&[20.0, 0.0, 0.0, 0.0]), None)
            .unwrap();
    }
    store.add_node("probe", None, None, None).unwrap();

    let seed = store.node("probe").unwrap().unwrap().snapshot_seed;
    let reading = SnapshotCompressor::reconstruct(&seed);
    assert_eq!(
        reading.to_string(),
        "focused context (energy high, entropy low, expansion high)"
    );
}
