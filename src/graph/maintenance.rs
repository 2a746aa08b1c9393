//! Mass decay, pruning, and hot → cold migration.
//!
//! Both [`TensorGraphStore::apply_metabolism`] and
//! [`TensorGraphStore::optimize_memory`] end in the same compaction: the
//! surviving rows are renumbered densely in their original order and every
//! edge touching a removed node is dropped. Cold records carry no edges, so
//! links to a migrated node are severed for good; the count is reported.

use serde::Serialize;
use tracing::{debug, info};

use super::store::{smallest_k, TensorGraphStore};
use super::types::{finite_or_zero, Annotation, ColdRecord, NodeMetadata, Provenance};
use crate::error::{Result, StoreError};

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MetabolismReport {
    pub decayed: usize,
    /// Ids removed from the hot tier. Not persisted anywhere.
    pub pruned: Vec<String>,
    pub edges_dropped: usize,
    pub remaining: usize,
}

#[derive(Debug, Serialize)]
pub struct TieringReport {
    /// Ids moved to the cold tier, lowest mass first.
    pub evicted: Vec<String>,
    pub edges_severed: usize,
    pub remaining: usize,
}

#[derive(Debug, Serialize)]
pub struct RecallReport {
    pub restored: Vec<String>,
    /// Requested ids already present in the hot tier.
    pub already_hot: Vec<String>,
    /// Requested ids the cold tier didn't have.
    pub missing: Vec<String>,
}

impl TensorGraphStore {
    // ── Metabolism ───────────────────────────────────────────────────────────

    /// Decay every node's mass by `decay_rate` (floored at 0), then remove
    /// every node with `mass <= prune_threshold`.
    ///
    /// Pruned nodes are discarded, not migrated; use
    /// [`optimize_memory`](Self::optimize_memory) to keep payloads.
    pub fn apply_metabolism(&self, decay_rate: f32, prune_threshold: f32) -> Result<MetabolismReport> {
        let mut state = self.write()?;
        let decayed = state.len();
        for mass in state.masses.iter_mut() {
            *mass = (*mass - decay_rate).max(0.0);
        }

        let keep: Vec<bool> = state.masses.iter().map(|m| *m > prune_threshold).collect();
        let compaction = state.compact(&keep);

        if !compaction.removed_ids.is_empty() {
            info!(
                pruned = compaction.removed_ids.len(),
                edges_dropped = compaction.edges_dropped,
                remaining = state.len(),
                "metabolism pruned nodes"
            );
        }
        debug!(decayed, decay_rate, prune_threshold, "metabolism tick");

        Ok(MetabolismReport {
            decayed,
            pruned: compaction.removed_ids,
            edges_dropped: compaction.edges_dropped,
            remaining: state.len(),
        })
    }

    // ── Tiering ──────────────────────────────────────────────────────────────

    /// If the hot tier holds more than `capacity` nodes, move the excess
    /// lowest-mass nodes to the cold tier and compact.
    ///
    /// The cold write happens first; if it fails the hot tier is untouched.
    /// Edges touching evicted nodes are dropped, not preserved.
    pub fn optimize_memory(&self, capacity: usize) -> Result<TieringReport> {
        let cold = self.cold.as_ref().ok_or(StoreError::NoColdTier)?;
        let mut state = self.write()?;
        let n = state.len();
        if n <= capacity {
            return Ok(TieringReport {
                evicted: Vec::new(),
                edges_severed: 0,
                remaining: n,
            });
        }

        let victims = smallest_k(&state.masses, n - capacity);
        let records: Vec<ColdRecord> = victims
            .iter()
            .map(|&i| ColdRecord {
                id: state.idx_to_id[i].clone(),
                vector: state.vectors.row(i).to_vec(),
                metadata: state.metadata[i].clone(),
                mass: state.masses[i],
            })
            .collect();
        cold.absorb(&records)?;

        let mut keep = vec![true; n];
        for &i in &victims {
            keep[i] = false;
        }
        let compaction = state.compact(&keep);

        info!(
            evicted = records.len(),
            edges_severed = compaction.edges_dropped,
            remaining = state.len(),
            "migrated nodes to cold tier"
        );

        Ok(TieringReport {
            evicted: records.into_iter().map(|r| r.id).collect(),
            edges_severed: compaction.edges_dropped,
            remaining: state.len(),
        })
    }

    /// Bring cold records back into the hot tier with their stored mass.
    ///
    /// Restored nodes get a fresh slot at the origin and no edges. The cold
    /// copy is kept.
    pub fn recall_from_cold(&self, ids: &[String]) -> Result<RecallReport> {
        let cold = self.cold.as_ref().ok_or(StoreError::NoColdTier)?;
        let records = cold.radiate(ids)?;

        let mut state = self.write()?;
        let mut restored = Vec::new();
        let mut already_hot = Vec::new();
        for record in &records {
            if state.id_to_idx.contains_key(&record.id) {
                already_hot.push(record.id.clone());
                continue;
            }
            let mut metadata = record.metadata.clone();
            let category = metadata.provenance().and_then(|p| p.category.clone());
            metadata.merge(NodeMetadata {
                annotations: vec![Annotation::Provenance(Provenance {
                    source: "cold_recall".into(),
                    category,
                })],
                extra: Default::default(),
            });
            let handle = state.upsert(&record.id, Some(&record.vector), None, Some(metadata))?;
            state.masses[handle.index] = finite_or_zero(record.mass, "mass", &record.id).max(0.0);
            restored.push(record.id.clone());
        }

        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !records.iter().any(|r| &r.id == *id))
            .cloned()
            .collect();

        info!(restored = restored.len(), missing = missing.len(), "recalled from cold tier");
        Ok(RecallReport {
            restored,
            already_hot,
            missing,
        })
    }
}
