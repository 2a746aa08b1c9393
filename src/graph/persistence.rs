//! Whole-store snapshots and bootstrap corpus import.
//!
//! A snapshot is one JSON bundle holding the id maps, every dense array, the
//! edge list and per-node metadata. Writes go to `<path>.tmp` and are renamed
//! into place. Loads are all-or-nothing: the bundle is fully validated before
//! it replaces the live state, and a bundle that fails validation is refused.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::snapshot::SEED_DIM;
use super::store::{GraphState, TensorGraphStore};
use super::types::{Edge, NodeMetadata, Position, POSITION_DIM};
use crate::error::{Result, StoreError};

const FORMAT_VERSION: u32 = 1;

/// Fields of a bootstrap item handled explicitly; everything else goes to `extra`.
const ITEM_KEYS: [&str; 5] = ["id", "name", "embedding", "vector", "pos"];

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotBundle {
    format_version: u32,
    dimension: usize,
    id_to_idx: HashMap<String, usize>,
    idx_to_id: Vec<String>,
    positions: Vec<Position>,
    vectors: Vec<Vec<f32>>,
    masses: Vec<f32>,
    seeds: Vec<Vec<f32>>,
    edges: Vec<Edge>,
    metadata: Vec<NodeMetadata>,
}

/// What [`TensorGraphStore::load`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum LoadOutcome {
    Loaded { nodes: usize, edges: usize },
    /// No file at the path; the store was left as it was.
    Missing,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Items whose id already existed and were merged in place.
    pub merged: usize,
    /// Items without a usable id, or rejected by the id policy.
    pub skipped: usize,
    /// Vectors or positions padded/truncated during this import.
    pub coerced: u64,
    /// `true` if the item cap stopped the import early.
    pub truncated: bool,
}

fn flatten(rows: &[Vec<f32>], width: usize, what: &str) -> Result<Vec<f32>> {
    let mut flat = Vec::with_capacity(rows.len() * width);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(StoreError::CorruptSnapshot(format!(
                "{what} row {i} has length {}, expected {width}",
                row.len()
            )));
        }
        flat.extend_from_slice(row);
    }
    Ok(flat)
}

impl SnapshotBundle {
    fn from_state(state: &GraphState) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            dimension: state.dim,
            id_to_idx: state.id_to_idx.clone(),
            idx_to_id: state.idx_to_id.clone(),
            positions: state
                .positions
                .rows()
                .into_iter()
                .map(|r| {
                    let mut p = [0.0f32; POSITION_DIM];
                    for (slot, v) in p.iter_mut().zip(r) {
                        *slot = *v;
                    }
                    p
                })
                .collect(),
            vectors: state.vectors.rows().into_iter().map(|r| r.to_vec()).collect(),
            masses: state.masses.clone(),
            seeds: state.seeds.rows().into_iter().map(|r| r.to_vec()).collect(),
            edges: state.edges.clone(),
            metadata: state.metadata.clone(),
        }
    }

    /// Rebuild a state, refusing anything that would break the index invariants.
    fn into_state(self, expected_dim: usize, generation: u64) -> Result<GraphState> {
        if self.format_version != FORMAT_VERSION {
            return Err(StoreError::CorruptSnapshot(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        if self.dimension != expected_dim {
            return Err(StoreError::DimensionMismatch {
                expected: expected_dim,
                got: self.dimension,
            });
        }
        let n = self.idx_to_id.len();
        let lengths = [
            ("id_to_idx", self.id_to_idx.len()),
            ("positions", self.positions.len()),
            ("vectors", self.vectors.len()),
            ("masses", self.masses.len()),
            ("seeds", self.seeds.len()),
            ("metadata", self.metadata.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(StoreError::CorruptSnapshot(format!(
                    "{name} has {len} entries, idx_to_id has {n}"
                )));
            }
        }

        let shape_err = |e: ndarray::ShapeError| StoreError::CorruptSnapshot(e.to_string());
        let vectors = Array2::from_shape_vec(
            (n, self.dimension),
            flatten(&self.vectors, self.dimension, "vector")?,
        )
        .map_err(shape_err)?;
        let seeds = Array2::from_shape_vec((n, SEED_DIM), flatten(&self.seeds, SEED_DIM, "seed")?)
            .map_err(shape_err)?;
        let positions = Array2::from_shape_vec(
            (n, POSITION_DIM),
            self.positions.iter().flatten().copied().collect(),
        )
        .map_err(shape_err)?;

        let state = GraphState {
            dim: self.dimension,
            id_to_idx: self.id_to_idx,
            idx_to_id: self.idx_to_id,
            vectors,
            positions,
            seeds,
            masses: self.masses,
            metadata: self.metadata,
            edges: self.edges,
            generation,
            coercions: 0,
        };
        state.check_invariants().map_err(StoreError::CorruptSnapshot)?;
        Ok(state)
    }
}

/// Read a float array out of a JSON value, treating non-numbers as 0.
/// Numbers outside `f32` range come out infinite; upsert zeroes and counts them.
fn float_array(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|xs| xs.iter().map(|x| x.as_f64().unwrap_or(0.0) as f32).collect())
}

/// `<path>.tmp`, next to the target so the final rename stays on one filesystem.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl TensorGraphStore {
    /// Write the whole hot tier to `path` atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let (bytes, nodes, edges) = {
            let state = self.read()?;
            let bundle = SnapshotBundle::from_state(&state);
            (serde_json::to_vec(&bundle)?, state.len(), state.edges.len())
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = tmp_path_for(path);
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, path)?;

        info!(path = %path.display(), nodes, edges, bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Replace the hot tier with the snapshot at `path`.
    ///
    /// A missing file is not an error: the store is left unchanged and
    /// [`LoadOutcome::Missing`] is returned. A file that fails to parse or
    /// validate is refused and the live state is untouched. A successful load
    /// advances the generation, so handles issued before it go stale.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadOutcome> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "no snapshot found, starting with an empty hot tier");
                return Ok(LoadOutcome::Missing);
            }
            Err(e) => return Err(e.into()),
        };
        let bundle: SnapshotBundle = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::CorruptSnapshot(format!("{}: {e}", path.display())))?;

        let mut state = self.write()?;
        let loaded = bundle.into_state(state.dim, state.generation + 1)?;
        let outcome = LoadOutcome::Loaded {
            nodes: loaded.len(),
            edges: loaded.edges.len(),
        };
        *state = loaded;

        info!(path = %path.display(), ?outcome, "snapshot loaded");
        Ok(outcome)
    }

    /// Bulk-load a bootstrap corpus: a JSON object mapping category labels to
    /// lists of `{id | name, embedding | vector, pos?}` items.
    ///
    /// Items without a string id/name, or rejected by the id policy, are
    /// skipped. Vectors and positions are coerced to fit. At most `limit`
    /// items are processed.
    pub fn import_corpus(&self, path: impl AsRef<Path>, limit: usize) -> Result<ImportReport> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let root: Value = serde_json::from_str(&text)?;
        let Some(categories) = root.as_object() else {
            warn!(path = %path.display(), "bootstrap corpus is not a JSON object, nothing imported");
            return Ok(ImportReport::default());
        };

        let mut report = ImportReport::default();
        let mut state = self.write()?;
        let coercions_before = state.coercions;

        'categories: for (category, items) in categories {
            let Some(items) = items.as_array() else {
                warn!(category = %category, "bootstrap category is not a list, skipped");
                continue;
            };
            for item in items {
                if report.imported + report.merged >= limit {
                    report.truncated = true;
                    break 'categories;
                }
                let Some(fields) = item.as_object() else {
                    report.skipped += 1;
                    continue;
                };
                let id = fields
                    .get("id")
                    .or_else(|| fields.get("name"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|id| !id.is_empty());
                let Some(id) = id else {
                    report.skipped += 1;
                    continue;
                };
                if !self.id_policy.accepts(id) {
                    warn!(id, "bootstrap item rejected by id policy");
                    report.skipped += 1;
                    continue;
                }

                let vector = fields
                    .get("embedding")
                    .or_else(|| fields.get("vector"))
                    .and_then(float_array);
                let position = fields.get("pos").and_then(float_array);

                let mut metadata = NodeMetadata::with_provenance("bootstrap", Some(category.as_str()));
                for (key, value) in fields {
                    if !ITEM_KEYS.contains(&key.as_str()) {
                        metadata.extra.insert(key.clone(), value.clone());
                    }
                }

                let existed = state.id_to_idx.contains_key(id);
                state.upsert(id, vector.as_deref(), position.as_deref(), Some(metadata))?;
                if existed {
                    report.merged += 1;
                } else {
                    report.imported += 1;
                }
            }
        }
        report.coerced = state.coercions - coercions_before;

        if report.truncated {
            warn!(limit, "bootstrap import stopped at item cap");
        }
        info!(
            path = %path.display(),
            imported = report.imported,
            merged = report.merged,
            skipped = report.skipped,
            coerced = report.coerced,
            "bootstrap import complete"
        );
        Ok(report)
    }
}
