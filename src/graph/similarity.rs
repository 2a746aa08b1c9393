//! Batched top-K cosine linking across the whole hot tier.
//!
//! Rows are L2-normalised once, then processed `batch_size` at a time: one
//! `batch × N` matrix product per batch, self-similarity masked, top-K taken
//! per row. Peak scratch memory is O(batch_size · N).

use ndarray::{s, Array2, ArrayView2, Axis};
use serde::Serialize;
use tracing::{debug, info};

use super::store::{largest_k, TensorGraphStore};
use super::types::{Edge, EdgeKind, PassControl};
use crate::error::{Result, StoreError};

/// Default number of rows per similarity batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub nodes: usize,
    pub batches: usize,
    /// Similarity edges now in the store.
    pub edges: usize,
    /// Similarity edges replaced by this pass.
    pub replaced: usize,
}

/// Copy of `vectors` with every non-zero row scaled to unit length.
pub fn l2_normalize_rows(vectors: ArrayView2<f32>) -> Array2<f32> {
    let mut out = vectors.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|x| x / norm);
        }
    }
    out
}

/// Compute the top-`k` most cosine-similar rows for every row of `vectors`.
///
/// Self pairs are never returned. Emits `min(k, N-1)` edges per row, each
/// weighted by its cosine similarity. Checks `control` for cancellation
/// before each batch and reports progress after it.
pub fn batched_top_k(
    vectors: ArrayView2<f32>,
    k: usize,
    batch_size: usize,
    control: &PassControl<'_>,
) -> Result<Vec<Edge>> {
    top_k_normalized(l2_normalize_rows(vectors).view(), k, batch_size, control)
}

/// [`batched_top_k`] over rows that are already unit length (or zero).
fn top_k_normalized(
    normed: ArrayView2<f32>,
    k: usize,
    batch_size: usize,
    control: &PassControl<'_>,
) -> Result<Vec<Edge>> {
    let n = normed.nrows();
    let k = k.min(n.saturating_sub(1));
    if k == 0 {
        return Ok(Vec::new());
    }

    let batch_size = batch_size.max(1);
    let total = n.div_ceil(batch_size);
    let mut edges = Vec::with_capacity(n * k);

    for (batch, start) in (0..n).step_by(batch_size).enumerate() {
        if control.is_cancelled() {
            return Err(StoreError::Cancelled { done: batch, total });
        }
        let end = (start + batch_size).min(n);
        let mut sims = normed.slice(s![start..end, ..]).dot(&normed.t());
        for r in 0..end - start {
            sims[[r, start + r]] = -1.0;
        }

        for (r, row) in sims.axis_iter(Axis(0)).enumerate() {
            let source = start + r;
            let values: Vec<f32> = row.iter().copied().collect();
            // One spare slot: an antipodal neighbour can tie the masked diagonal.
            let picked = largest_k(&values, k + 1)
                .into_iter()
                .filter(|&j| j != source)
                .take(k);
            edges.extend(picked.map(|target| Edge {
                source,
                target,
                weight: values[target],
                kind: EdgeKind::Similarity,
            }));
        }
        control.report(batch + 1, total);
    }

    Ok(edges)
}

impl TensorGraphStore {
    /// Re-link the hot tier by vector similarity.
    ///
    /// Replaces every existing [`EdgeKind::Similarity`] edge with the fresh
    /// top-`k` set; explicit and wormhole edges are kept. Nothing is written
    /// if the pass is cancelled or a compaction lands before commit.
    pub fn ignite_gravity(
        &self,
        k: usize,
        batch_size: usize,
        control: PassControl<'_>,
    ) -> Result<LinkReport> {
        // The normalised copy is taken under the read lock; the batches run without it.
        let (started, normed) = {
            let state = self.read()?;
            (state.generation, l2_normalize_rows(state.vectors.view()))
        };
        let nodes = normed.nrows();
        let fresh = top_k_normalized(normed.view(), k, batch_size, &control)?;

        let mut state = self.write()?;
        if state.generation != started {
            return Err(StoreError::Concurrent {
                started,
                current: state.generation,
            });
        }
        let before = state.edges.len();
        state.edges.retain(|e| e.kind != EdgeKind::Similarity);
        let replaced = before - state.edges.len();
        let edges = fresh.len();
        state.edges.extend(fresh);

        let batches = nodes.div_ceil(batch_size.max(1));
        debug!(nodes, batches, replaced, "similarity pass committed");
        info!(nodes, edges, k, "ignite_gravity complete");
        Ok(LinkReport {
            nodes,
            batches,
            edges,
            replaced,
        })
    }
}
