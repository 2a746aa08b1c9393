//! CLI commands for the linking and layout passes.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use tiergraph::config::TiergraphConfig;
use tiergraph::graph::PassControl;

/// Run the batched similarity pass with a progress bar.
pub fn ignite(config: &TiergraphConfig, k: Option<usize>) -> Result<()> {
    let store = super::open_store(config)?;
    let k = k.unwrap_or(config.linking.top_k);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} batches ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );
    let progress = |done: usize, total: usize| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    };
    let control = PassControl {
        cancel: None,
        progress: Some(&progress),
    };

    let report = store.ignite_gravity(k, config.linking.batch_size, control)?;
    pb.finish_and_clear();
    super::save_store(config, &store)?;

    println!(
        "Linked {} nodes: {} similarity edges ({} replaced) in {} batches",
        report.nodes, report.edges, report.replaced, report.batches
    );
    Ok(())
}

pub fn layout(config: &TiergraphConfig) -> Result<()> {
    let store = super::open_store(config)?;
    let report = store.apply_gravity(&config.layout, &[], PassControl::none())?;
    if report.skipped {
        println!(
            "Layout skipped: {} nodes exceeds layout.max_nodes ({})",
            report.nodes, config.layout.max_nodes
        );
        return Ok(());
    }
    super::save_store(config, &store)?;
    println!(
        "Relaxed {} nodes over {} iterations (mean displacement {:.4})",
        report.nodes, report.iterations, report.mean_displacement
    );
    Ok(())
}

pub fn fold(config: &TiergraphConfig) -> Result<()> {
    let store = super::open_store(config)?;
    let report = store.fold_space(&config.folding, PassControl::none())?;
    super::save_store(config, &store)?;
    println!(
        "Examined {} pairs ({}): {} wormholes formed",
        report.pairs_examined,
        if report.exhaustive { "exhaustive" } else { "sampled" },
        report.wormholes_added
    );
    Ok(())
}
