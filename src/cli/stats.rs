use anyhow::Result;

use tiergraph::config::TiergraphConfig;
use tiergraph::graph::EdgeKind;

/// Display hot- and cold-tier statistics in the terminal.
pub fn stats(config: &TiergraphConfig) -> Result<()> {
    let store = super::open_store(config)?;
    let stats = store.stats()?;

    println!("Hot Tier");
    println!("{}", "=".repeat(40));
    println!("  Nodes:               {}", stats.nodes);
    println!("  Dimension:           {}", stats.dimension);
    println!("  Edges:               {}", stats.edges);
    for kind in [EdgeKind::Explicit, EdgeKind::Similarity, EdgeKind::Wormhole] {
        let count = stats.edges_by_kind.get(kind.as_str()).copied().unwrap_or(0);
        println!("    {:<18} {}", kind.as_str(), count);
    }
    println!("  Total mass:          {:.3}", stats.total_mass);
    if let (Some(min), Some(max)) = (stats.min_mass, stats.max_mass) {
        println!("  Mass range:          {min:.3} .. {max:.3}");
    }
    println!("  Ingestion coercions: {}", stats.coercions);
    println!();

    if let Some(cold) = store.cold_store() {
        println!("Cold Tier");
        println!("{}", "=".repeat(40));
        println!("  Records:             {}", cold.len()?);
        if let Some(path) = cold.path() {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            println!("  Database size:       {size} bytes");
        }
    }

    Ok(())
}
