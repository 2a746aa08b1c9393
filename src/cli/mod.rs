pub mod doctor;
pub mod import;
pub mod maintenance;
pub mod neighbors;
pub mod passes;
pub mod stats;

use anyhow::{Context, Result};
use std::sync::Arc;

use tiergraph::config::TiergraphConfig;
use tiergraph::{ColdStore, TensorGraphStore};

/// Build the process-lifetime store: open the cold tier, attach it, and load
/// the hot-tier snapshot if one exists.
pub fn open_store(config: &TiergraphConfig) -> Result<TensorGraphStore> {
    let cold_path = config.resolved_cold_db_path();
    let cold = ColdStore::open(&cold_path, config.graph.dimension)
        .with_context(|| format!("failed to open cold tier at {}", cold_path.display()))?;

    let store = TensorGraphStore::new(config.graph.dimension)
        .with_reinforcement(config.graph.reinforcement)
        .with_cold_store(Arc::new(cold));

    let snapshot = config.resolved_snapshot_path();
    store
        .load(&snapshot)
        .with_context(|| format!("refusing to load snapshot {}", snapshot.display()))?;
    Ok(store)
}

/// Persist the hot tier back to the configured snapshot path.
pub fn save_store(config: &TiergraphConfig, store: &TensorGraphStore) -> Result<()> {
    let snapshot = config.resolved_snapshot_path();
    store
        .save(&snapshot)
        .with_context(|| format!("failed to save snapshot {}", snapshot.display()))
}
