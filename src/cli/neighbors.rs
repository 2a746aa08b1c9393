use anyhow::{bail, Result};

use tiergraph::config::TiergraphConfig;
use tiergraph::graph::SnapshotCompressor;

/// Print a node, its snapshot-seed reading, and its nearest neighbours.
pub fn neighbors(config: &TiergraphConfig, id: &str, k: usize) -> Result<()> {
    let store = super::open_store(config)?;
    let Some(node) = store.node(id)? else {
        bail!("node not found in hot tier: {id}");
    };

    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "id": node.id,
        "index": node.index,
        "mass": node.mass,
        "position": node.position,
        "metadata": node.metadata,
    }))?);
    println!();
    println!("Context at creation: {}", SnapshotCompressor::reconstruct(&node.snapshot_seed));
    println!();
    println!("Nearest {k} by position:");
    for (neighbor, distance) in store.k_nearest(id, k)? {
        println!("  {distance:>10.4}  {neighbor}");
    }
    Ok(())
}
