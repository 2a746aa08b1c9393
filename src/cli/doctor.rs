//! CLI `doctor` command: cold-tier diagnostics plus a hot-tier consistency check.

use anyhow::{Context, Result};

use tiergraph::config::TiergraphConfig;

pub fn doctor(config: &TiergraphConfig) -> Result<()> {
    let store = super::open_store(config).context("failed to open store (snapshot may be corrupt)")?;

    println!("Tiergraph Health Report");
    println!("=======================");
    println!();
    println!("Snapshot:          {}", config.resolved_snapshot_path().display());
    match store.check_consistency()? {
        Ok(()) => println!("Hot tier:          OK ({} nodes)", store.len()?),
        Err(problem) => println!("Hot tier:          INCONSISTENT ({problem})"),
    }
    println!();

    if let Some(cold) = store.cold_store() {
        let report = cold.health().context("failed to run health check")?;
        println!("Cold tier:         {}", config.resolved_cold_db_path().display());
        println!("Schema version:    {}", report.schema_version);
        println!(
            "Vector dimension:  {} (configured {})",
            report.vector_dim.map(|d| d.to_string()).unwrap_or_else(|| "(not set)".into()),
            config.graph.dimension
        );
        println!("Records:           {}", report.record_count);
        if report.integrity_ok {
            println!("Integrity check:   PASSED");
        } else {
            println!("Integrity check:   FAILED ({})", report.integrity_details);
        }
    }
    Ok(())
}
