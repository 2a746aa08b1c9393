use anyhow::{Context, Result};
use std::path::Path;

use tiergraph::config::TiergraphConfig;

/// Import a bootstrap corpus into the hot tier and save the snapshot.
pub fn import(config: &TiergraphConfig, file: &Path, limit: Option<usize>) -> Result<()> {
    let store = super::open_store(config)?;
    let limit = limit.unwrap_or(config.graph.import_limit);

    let report = store
        .import_corpus(file, limit)
        .with_context(|| format!("failed to import {}", file.display()))?;
    super::save_store(config, &store)?;

    println!("Import complete:");
    println!("  Nodes imported:  {}", report.imported);
    println!("  Nodes merged:    {}", report.merged);
    println!("  Items skipped:   {}", report.skipped);
    if report.coerced > 0 {
        println!("  Coerced fields:  {} (padded or truncated to fit)", report.coerced);
    }
    if report.truncated {
        println!("  Stopped at the item cap ({limit})");
    }
    Ok(())
}
