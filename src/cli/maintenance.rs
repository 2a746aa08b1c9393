use anyhow::Result;

use tiergraph::config::TiergraphConfig;

/// One metabolism tick: decay, prune, compact.
pub fn metabolize(config: &TiergraphConfig) -> Result<()> {
    let store = super::open_store(config)?;
    let report = store.apply_metabolism(
        config.metabolism.decay_rate,
        config.metabolism.prune_threshold,
    )?;
    super::save_store(config, &store)?;

    println!("Metabolism:");
    println!("  Decayed:        {}", report.decayed);
    println!("  Pruned:         {}", report.pruned.len());
    println!("  Edges dropped:  {}", report.edges_dropped);
    println!("  Remaining:      {}", report.remaining);
    Ok(())
}

/// Migrate the lowest-mass nodes to the cold tier if over capacity.
pub fn tier(config: &TiergraphConfig, capacity: Option<usize>) -> Result<()> {
    let store = super::open_store(config)?;
    let capacity = capacity.unwrap_or(config.graph.capacity);
    let report = store.optimize_memory(capacity)?;
    if report.evicted.is_empty() {
        println!("Hot tier within capacity ({} <= {capacity})", report.remaining);
        return Ok(());
    }
    super::save_store(config, &store)?;

    println!("Tiering:");
    println!("  Migrated to cold: {}", report.evicted.len());
    println!("  Edges severed:    {}", report.edges_severed);
    println!("  Remaining hot:    {}", report.remaining);
    Ok(())
}

pub fn recall(config: &TiergraphConfig, ids: &[String]) -> Result<()> {
    let store = super::open_store(config)?;
    let report = store.recall_from_cold(ids)?;
    super::save_store(config, &store)?;

    println!("Recalled {} nodes", report.restored.len());
    for id in &report.already_hot {
        println!("  already hot: {id}");
    }
    for id in &report.missing {
        println!("  not in cold tier: {id}");
    }
    Ok(())
}
