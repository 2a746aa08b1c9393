//! The hot tier: dense per-node arrays, the edge list, and the id/index maps.
//!
//! [`TensorGraphStore`] guards a [`GraphState`] with an `RwLock`. Every
//! mutation takes the write lock for its whole duration; queries take the read
//! lock. Heavy passes (see `similarity`, `layout`, `folding`) compute under
//! the read lock and commit under the write lock, checking that no compaction
//! happened in between.
//!
//! Ingestion is lenient by contract: vectors and positions of the wrong length
//! are zero-padded or truncated, logged, and counted in
//! [`GraphStats::coercions`]. Nothing on the ingestion path fails because of a
//! dimension mismatch.

use ndarray::{Array2, ArrayView1, Axis};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::snapshot::{SnapshotCompressor, SEED_DIM};
use super::types::{
    finite_or_zero, fit_vector, Edge, EdgeKind, IdPolicy, NodeHandle, NodeMetadata, Position,
    POSITION_DIM,
};
use crate::cold::ColdStore;
use crate::error::{Result, StoreError};

/// Mass assigned to freshly inserted nodes.
pub const INITIAL_MASS: f32 = 1.0;

/// Default mass bump applied by [`TensorGraphStore::update_vector`].
pub const DEFAULT_REINFORCEMENT: f32 = 0.1;

// ── Dense state ──────────────────────────────────────────────────────────────

/// Everything the hot tier owns. Row `i` of every array belongs to the node
/// whose id is `idx_to_id[i]`.
#[derive(Debug, Clone)]
pub(crate) struct GraphState {
    pub(crate) dim: usize,
    pub(crate) id_to_idx: HashMap<String, usize>,
    pub(crate) idx_to_id: Vec<String>,
    /// N × D
    pub(crate) vectors: Array2<f32>,
    /// N × 4
    pub(crate) positions: Array2<f32>,
    /// N × SEED_DIM
    pub(crate) seeds: Array2<f32>,
    pub(crate) masses: Vec<f32>,
    pub(crate) metadata: Vec<NodeMetadata>,
    pub(crate) edges: Vec<Edge>,
    /// Bumped by every compaction that removed at least one node.
    pub(crate) generation: u64,
    pub(crate) coercions: u64,
}

/// What a compaction removed.
#[derive(Debug, Default)]
pub(crate) struct Compaction {
    pub(crate) removed_ids: Vec<String>,
    pub(crate) edges_dropped: usize,
}

impl GraphState {
    pub(crate) fn empty(dim: usize) -> Self {
        Self {
            dim,
            id_to_idx: HashMap::new(),
            idx_to_id: Vec::new(),
            vectors: Array2::zeros((0, dim)),
            positions: Array2::zeros((0, POSITION_DIM)),
            seeds: Array2::zeros((0, SEED_DIM)),
            masses: Vec::new(),
            metadata: Vec::new(),
            edges: Vec::new(),
            generation: 0,
            coercions: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.idx_to_id.len()
    }

    pub(crate) fn handle(&self, index: usize) -> NodeHandle {
        NodeHandle {
            index,
            generation: self.generation,
        }
    }

    pub(crate) fn check_handle(&self, handle: NodeHandle) -> Result<usize> {
        if handle.generation != self.generation || handle.index >= self.len() {
            return Err(StoreError::StaleHandle {
                issued: handle.generation,
                current: self.generation,
            });
        }
        Ok(handle.index)
    }

    /// Insert a node, or update it in place if the id is already present.
    pub(crate) fn upsert(
        &mut self,
        id: &str,
        vector: Option<&[f32]>,
        position: Option<&[f32]>,
        metadata: Option<NodeMetadata>,
    ) -> Result<NodeHandle> {
        let vector = vector.map(|v| {
            let fitted = fit_vector(v, self.dim, "vector", id);
            if fitted.was_coerced() {
                self.coercions += 1;
            }
            fitted.values
        });
        let position = position.map(|p| {
            let fitted = fit_vector(p, POSITION_DIM, "position", id);
            if fitted.was_coerced() {
                self.coercions += 1;
            }
            fitted.values
        });

        if let Some(&idx) = self.id_to_idx.get(id) {
            if let Some(v) = vector {
                self.vectors.row_mut(idx).assign(&ArrayView1::from(&v[..]));
            }
            if let Some(p) = position {
                self.positions.row_mut(idx).assign(&ArrayView1::from(&p[..]));
            }
            if let Some(m) = metadata {
                self.metadata[idx].merge(m);
            }
            return Ok(self.handle(idx));
        }

        // Seed reflects the store as it was before this node arrived.
        let seed = SnapshotCompressor::capture(self.positions.view(), self.vectors.view());
        let vector = vector.unwrap_or_else(|| vec![0.0; self.dim]);
        let position = position.unwrap_or_else(|| vec![0.0; POSITION_DIM]);

        let dim = self.dim;
        let mismatch = |got: usize| StoreError::DimensionMismatch { expected: dim, got };
        self.vectors
            .push_row(ArrayView1::from(&vector[..]))
            .map_err(|_| mismatch(vector.len()))?;
        self.positions
            .push_row(ArrayView1::from(&position[..]))
            .map_err(|_| mismatch(position.len()))?;
        self.seeds
            .push_row(ArrayView1::from(&seed[..]))
            .map_err(|_| mismatch(seed.len()))?;
        self.masses.push(INITIAL_MASS);
        self.metadata.push(metadata.unwrap_or_default());

        let idx = self.idx_to_id.len();
        self.idx_to_id.push(id.to_string());
        self.id_to_idx.insert(id.to_string(), idx);
        Ok(self.handle(idx))
    }

    /// Drop every row whose `keep` flag is false, renumber the survivors
    /// densely in their original order, and remap the edge list. Edges with
    /// either endpoint removed are dropped.
    pub(crate) fn compact(&mut self, keep: &[bool]) -> Compaction {
        let n = self.len();
        debug_assert_eq!(keep.len(), n);

        let mut remap: Vec<Option<usize>> = vec![None; n];
        let mut kept: Vec<usize> = Vec::with_capacity(n);
        let mut removed_ids = Vec::new();
        for old in 0..n {
            if keep.get(old).copied().unwrap_or(false) {
                remap[old] = Some(kept.len());
                kept.push(old);
            } else {
                removed_ids.push(self.idx_to_id[old].clone());
            }
        }
        if removed_ids.is_empty() {
            return Compaction::default();
        }

        self.vectors = self.vectors.select(Axis(0), &kept);
        self.positions = self.positions.select(Axis(0), &kept);
        self.seeds = self.seeds.select(Axis(0), &kept);
        self.masses = kept.iter().map(|&i| self.masses[i]).collect();

        let metadata = std::mem::take(&mut self.metadata);
        self.metadata = metadata
            .into_iter()
            .zip(&remap)
            .filter_map(|(m, slot)| slot.map(|_| m))
            .collect();

        let ids = std::mem::take(&mut self.idx_to_id);
        self.idx_to_id = ids
            .into_iter()
            .zip(&remap)
            .filter_map(|(id, slot)| slot.map(|_| id))
            .collect();
        self.id_to_idx = self
            .idx_to_id
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let before = self.edges.len();
        let lookup = |i: usize| remap.get(i).copied().flatten();
        self.edges = std::mem::take(&mut self.edges)
            .into_iter()
            .filter_map(|e| {
                Some(Edge {
                    source: lookup(e.source)?,
                    target: lookup(e.target)?,
                    ..e
                })
            })
            .collect();

        self.generation += 1;
        Compaction {
            removed_ids,
            edges_dropped: before - self.edges.len(),
        }
    }

    /// Verify the structural invariants: bijective id maps, dense indices,
    /// consistent array shapes, non-negative masses, in-range edges.
    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        let n = self.idx_to_id.len();
        if self.id_to_idx.len() != n {
            return Err(format!(
                "id_to_idx has {} entries, idx_to_id has {n}",
                self.id_to_idx.len()
            ));
        }
        for (i, id) in self.idx_to_id.iter().enumerate() {
            if self.id_to_idx.get(id) != Some(&i) {
                return Err(format!("id {id:?} at index {i} is not mapped back to {i}"));
            }
        }
        let shapes = [
            ("vectors", self.vectors.dim(), self.dim),
            ("positions", self.positions.dim(), POSITION_DIM),
            ("seeds", self.seeds.dim(), SEED_DIM),
        ];
        for (name, (rows, cols), expected_cols) in shapes {
            if rows != n || cols != expected_cols {
                return Err(format!(
                    "{name} is {rows}x{cols}, expected {n}x{expected_cols}"
                ));
            }
        }
        if self.masses.len() != n || self.metadata.len() != n {
            return Err(format!(
                "masses ({}) / metadata ({}) length differs from node count {n}",
                self.masses.len(),
                self.metadata.len()
            ));
        }
        if let Some(m) = self.masses.iter().find(|m| !m.is_finite() || **m < 0.0) {
            return Err(format!("invalid mass {m}"));
        }
        if let Some(e) = self.edges.iter().find(|e| e.source >= n || e.target >= n) {
            return Err(format!(
                "edge ({}, {}) references an index outside [0, {n})",
                e.source, e.target
            ));
        }
        Ok(())
    }
}

// ── Selection helpers ────────────────────────────────────────────────────────

/// Indices of the `k` smallest values, ascending by value (ties by index).
/// Partial selection, not a full sort of `values`.
pub(crate) fn smallest_k(values: &[f32], k: usize) -> Vec<usize> {
    select_k(values, k, |a, b| a.total_cmp(b))
}

/// Indices of the `k` largest values, descending by value (ties by index).
pub(crate) fn largest_k(values: &[f32], k: usize) -> Vec<usize> {
    select_k(values, k, |a, b| b.total_cmp(a))
}

fn select_k(
    values: &[f32],
    k: usize,
    order: impl Fn(&f32, &f32) -> std::cmp::Ordering,
) -> Vec<usize> {
    let k = k.min(values.len());
    if k == 0 {
        return Vec::new();
    }
    let cmp = |a: &usize, b: &usize| order(&values[*a], &values[*b]).then(a.cmp(b));
    let mut idx: Vec<usize> = (0..values.len()).collect();
    if k < idx.len() {
        idx.select_nth_unstable_by(k - 1, cmp);
        idx.truncate(k);
    }
    idx.sort_unstable_by(cmp);
    idx
}

// ── Public views ─────────────────────────────────────────────────────────────

/// A copy of one hot-tier node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: String,
    pub index: usize,
    pub vector: Vec<f32>,
    pub position: Position,
    pub mass: f32,
    pub snapshot_seed: Vec<f32>,
    pub metadata: NodeMetadata,
}

/// An edge resolved to ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeView {
    pub source: String,
    pub target: String,
    pub weight: f32,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub dimension: usize,
    pub edges: usize,
    pub edges_by_kind: HashMap<String, usize>,
    pub total_mass: f64,
    pub min_mass: Option<f32>,
    pub max_mass: Option<f32>,
    /// Vectors or positions padded/truncated on ingestion since construction.
    pub coercions: u64,
    pub generation: u64,
}

// ── Store ────────────────────────────────────────────────────────────────────

/// The hot tier. Construct once and share (`Arc`) with collaborators.
#[derive(Debug)]
pub struct TensorGraphStore {
    pub(crate) state: RwLock<GraphState>,
    pub(crate) id_policy: IdPolicy,
    pub(crate) reinforcement: f32,
    pub(crate) cold: Option<Arc<ColdStore>>,
}

impl TensorGraphStore {
    /// Empty store with vector dimension `dim`, fixed for its lifetime.
    pub fn new(dim: usize) -> Self {
        Self {
            state: RwLock::new(GraphState::empty(dim)),
            id_policy: IdPolicy::default(),
            reinforcement: DEFAULT_REINFORCEMENT,
            cold: None,
        }
    }

    pub fn with_id_policy(mut self, policy: IdPolicy) -> Self {
        self.id_policy = policy;
        self
    }

    pub fn with_reinforcement(mut self, bump: f32) -> Self {
        self.reinforcement = bump;
        self
    }

    /// Attach the cold tier used by tiering and recall.
    pub fn with_cold_store(mut self, cold: Arc<ColdStore>) -> Self {
        self.cold = Some(cold);
        self
    }

    pub fn cold_store(&self) -> Option<&Arc<ColdStore>> {
        self.cold.as_ref()
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, GraphState>> {
        self.state
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, GraphState>> {
        self.state
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn validate_id(&self, id: &str) -> Result<()> {
        if self.id_policy.accepts(id) {
            Ok(())
        } else {
            Err(StoreError::InvalidId(id.to_string()))
        }
    }

    /// Insert a node, or merge into the existing node with the same id.
    ///
    /// New nodes start at [`INITIAL_MASS`] and get a snapshot seed captured
    /// from the store as it was before the insert. Missing vectors/positions
    /// default to zeros; wrong-length ones are coerced.
    pub fn add_node(
        &self,
        id: &str,
        vector: Option<&[f32]>,
        position: Option<&[f32]>,
        metadata: Option<NodeMetadata>,
    ) -> Result<NodeHandle> {
        self.validate_id(id)?;
        let mut state = self.write()?;
        state.upsert(id, vector, position, metadata)
    }

    /// Overwrite a node's vector (coerced to D) and reinforce its mass.
    pub fn update_vector(&self, handle: NodeHandle, vector: &[f32]) -> Result<()> {
        let mut state = self.write()?;
        let idx = state.check_handle(handle)?;
        let dim = state.dim;
        let id = state.idx_to_id[idx].clone();
        let fitted = fit_vector(vector, dim, "vector", &id);
        if fitted.was_coerced() {
            state.coercions += 1;
        }
        state
            .vectors
            .row_mut(idx)
            .assign(&ArrayView1::from(&fitted.values[..]));
        state.masses[idx] += self.reinforcement;
        Ok(())
    }

    /// Append an explicit edge, creating missing endpoints with default payloads.
    pub fn add_edge(&self, source_id: &str, target_id: &str, weight: f32) -> Result<()> {
        self.validate_id(source_id)?;
        self.validate_id(target_id)?;
        let weight = finite_or_zero(weight, "weight", source_id);
        let mut state = self.write()?;
        let source = state.upsert(source_id, None, None, None)?.index;
        let target = state.upsert(target_id, None, None, None)?.index;
        state.edges.push(Edge {
            source,
            target,
            weight,
            kind: EdgeKind::Explicit,
        });
        Ok(())
    }

    /// The `k` nodes closest to `id` in position space, excluding `id` itself.
    pub fn k_nearest(&self, id: &str, k: usize) -> Result<Vec<(String, f32)>> {
        let state = self.read()?;
        let &query = state
            .id_to_idx
            .get(id)
            .ok_or_else(|| StoreError::UnknownNode(id.to_string()))?;
        let origin = state.positions.row(query);

        let distances: Vec<f32> = state
            .positions
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                if i == query {
                    f32::INFINITY
                } else {
                    (&row - &origin).mapv(|d| d * d).sum().sqrt()
                }
            })
            .collect();

        let k = k.min(state.len().saturating_sub(1));
        Ok(smallest_k(&distances, k)
            .into_iter()
            .map(|i| (state.idx_to_id[i].clone(), distances[i]))
            .collect())
    }

    /// Set a node's mass directly (clamped to ≥ 0; non-finite becomes 0).
    pub fn set_mass(&self, id: &str, mass: f32) -> Result<()> {
        let mut state = self.write()?;
        let &idx = state
            .id_to_idx
            .get(id)
            .ok_or_else(|| StoreError::UnknownNode(id.to_string()))?;
        state.masses[idx] = finite_or_zero(mass, "mass", id).max(0.0);
        Ok(())
    }

    /// Resolve an id to a handle valid until the next compaction.
    pub fn handle_of(&self, id: &str) -> Result<Option<NodeHandle>> {
        let state = self.read()?;
        Ok(state.id_to_idx.get(id).map(|&i| state.handle(i)))
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.read()?.id_to_idx.contains_key(id))
    }

    pub fn node(&self, id: &str) -> Result<Option<NodeView>> {
        let state = self.read()?;
        let Some(&idx) = state.id_to_idx.get(id) else {
            return Ok(None);
        };
        let mut position = [0.0f32; POSITION_DIM];
        for (slot, v) in position.iter_mut().zip(state.positions.row(idx)) {
            *slot = *v;
        }
        Ok(Some(NodeView {
            id: id.to_string(),
            index: idx,
            vector: state.vectors.row(idx).to_vec(),
            position,
            mass: state.masses[idx],
            snapshot_seed: state.seeds.row(idx).to_vec(),
            metadata: state.metadata[idx].clone(),
        }))
    }

    /// Ids in index order.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self.read()?.idx_to_id.clone())
    }

    pub fn edges(&self) -> Result<Vec<EdgeView>> {
        let state = self.read()?;
        Ok(state
            .edges
            .iter()
            .map(|e| EdgeView {
                source: state.idx_to_id[e.source].clone(),
                target: state.idx_to_id[e.target].clone(),
                weight: e.weight,
                kind: e.kind,
            })
            .collect())
    }

    /// Raw edge list in index space.
    pub fn raw_edges(&self) -> Result<Vec<Edge>> {
        Ok(self.read()?.edges.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn dimension(&self) -> usize {
        self.state.read().map(|s| s.dim).unwrap_or_else(|e| e.into_inner().dim)
    }

    pub fn generation(&self) -> Result<u64> {
        Ok(self.read()?.generation)
    }

    pub fn stats(&self) -> Result<GraphStats> {
        let state = self.read()?;
        let mut edges_by_kind = HashMap::new();
        for e in &state.edges {
            *edges_by_kind.entry(e.kind.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(GraphStats {
            nodes: state.len(),
            dimension: state.dim,
            edges: state.edges.len(),
            edges_by_kind,
            total_mass: state.masses.iter().map(|m| *m as f64).sum(),
            min_mass: state.masses.iter().copied().reduce(f32::min),
            max_mass: state.masses.iter().copied().reduce(f32::max),
            coercions: state.coercions,
            generation: state.generation,
        })
    }

    /// Check bijectivity, density, shapes and edge ranges. Returns a
    /// description of the first violation found.
    pub fn check_consistency(&self) -> Result<std::result::Result<(), String>> {
        Ok(self.read()?.check_invariants())
    }
}
