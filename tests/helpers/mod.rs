#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use tiergraph::{ColdStore, TensorGraphStore};

pub const DIM: usize = 8;

/// A hot tier with no cold store attached.
pub fn test_store() -> TensorGraphStore {
    TensorGraphStore::new(DIM)
}

/// A hot tier backed by an in-memory cold tier. Returns both so tests can
/// inspect the cold side directly.
pub fn tiered_store() -> (TensorGraphStore, Arc<ColdStore>) {
    let cold = Arc::new(ColdStore::open_in_memory(DIM).unwrap());
    (TensorGraphStore::new(DIM).with_cold_store(cold.clone()), cold)
}

/// A hot tier backed by a cold tier file under `dir`.
pub fn tiered_store_on_disk(dir: &Path) -> (TensorGraphStore, Arc<ColdStore>) {
    let cold = Arc::new(ColdStore::open(dir.join("cold.db"), DIM).unwrap());
    (TensorGraphStore::new(DIM).with_cold_store(cold.clone()), cold)
}

/// Deterministic unit vector with a spike at `seed`. Distinct seeds are orthogonal.
pub fn test_vector(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed % DIM] = 1.0;
    v
}

/// A vector close to `base` in cosine terms.
pub fn similar_vector(base: &[f32]) -> Vec<f32> {
    let mut v = base.to_vec();
    for (i, x) in v.iter_mut().enumerate() {
        *x += 0.01 * (i as f32 + 1.0);
    }
    v
}

/// Insert `ids` with spike vectors and positions spread along the first axis.
pub fn populate(store: &TensorGraphStore, ids: &[&str]) {
    for (i, id) in ids.iter().enumerate() {
        store
            .add_node(id, Some(&test_vector(i)), Some(&[i as f32, 0.0, 0.0, 0.0]), None)
            .unwrap();
    }
}

/// Edges as sorted `(source_id, target_id)` pairs.
pub fn edge_pairs(store: &TensorGraphStore) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = store
        .edges()
        .unwrap()
        .into_iter()
        .map(|e| (e.source, e.target))
        .collect();
    pairs.sort();
    pairs
}

/// Panic with the violation if the index space is inconsistent.
pub fn assert_consistent(store: &TensorGraphStore) {
    if let Err(problem) = store.check_consistency().unwrap() {
        panic!("store inconsistent: {problem}");
    }
}
