use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::graph::similarity::DEFAULT_BATCH_SIZE;
use crate::graph::store::DEFAULT_REINFORCEMENT;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TiergraphConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub graph: GraphConfig,
    pub linking: LinkingConfig,
    pub layout: LayoutConfig,
    pub metabolism: MetabolismConfig,
    pub folding: FoldingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub cold_db_path: String,
    pub snapshot_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphConfig {
    /// Vector dimension D, fixed for the store's lifetime.
    pub dimension: usize,
    /// Hot-tier node budget; tiering migrates anything above it.
    pub capacity: usize,
    /// Maximum items processed by one bootstrap import.
    pub import_limit: usize,
    /// Mass added by each vector update.
    pub reinforcement: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LinkingConfig {
    pub top_k: usize,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LayoutConfig {
    pub iterations: usize,
    pub learning_rate: f32,
    pub similarity_threshold: f32,
    pub min_distance: f32,
    pub attraction: f32,
    pub repulsion: f32,
    /// Layout is O(N²); above this many nodes it is skipped.
    pub max_nodes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetabolismConfig {
    pub decay_rate: f32,
    pub prune_threshold: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FoldingConfig {
    /// Wall spacing L of the reflecting space.
    pub boundary: f32,
    pub max_reflections: u32,
    /// Folded distances below this count as coincident.
    pub threshold: f32,
    /// Pairs closer than this in raw space are never wormhole candidates.
    pub min_raw_distance: f32,
    /// Random pairs examined when the store has more pairs than this.
    pub sample_size: usize,
    pub weight: f32,
    /// Fixed RNG seed for reproducible sampling.
    pub seed: Option<u64>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = default_tiergraph_dir();
        Self {
            cold_db_path: dir.join("cold.db").to_string_lossy().into_owned(),
            snapshot_path: dir.join("hot.json").to_string_lossy().into_owned(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            capacity: 10_000,
            import_limit: 50_000,
            reinforcement: DEFAULT_REINFORCEMENT,
        }
    }
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            learning_rate: 0.05,
            similarity_threshold: 0.7,
            min_distance: 0.5,
            attraction: 0.1,
            repulsion: 1.0,
            max_nodes: 2_000,
        }
    }
}

impl Default for MetabolismConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.01,
            prune_threshold: 0.1,
        }
    }
}

impl Default for FoldingConfig {
    fn default() -> Self {
        Self {
            boundary: 10.0,
            max_reflections: 4,
            threshold: 0.1,
            min_raw_distance: 5.0,
            sample_size: 10_000,
            weight: 0.1,
            seed: None,
        }
    }
}

/// Returns `~/.tiergraph/`, or `./.tiergraph` when no home directory is known.
pub fn default_tiergraph_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tiergraph")
}

/// Returns the default config file path: `~/.tiergraph/config.toml`
pub fn default_config_path() -> PathBuf {
    default_tiergraph_dir().join("config.toml")
}

impl TiergraphConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            TiergraphConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (TIERGRAPH_COLD_DB, TIERGRAPH_SNAPSHOT, TIERGRAPH_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TIERGRAPH_COLD_DB") {
            self.storage.cold_db_path = val;
        }
        if let Ok(val) = std::env::var("TIERGRAPH_SNAPSHOT") {
            self.storage.snapshot_path = val;
        }
        if let Ok(val) = std::env::var("TIERGRAPH_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    pub fn resolved_cold_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.cold_db_path)
    }

    pub fn resolved_snapshot_path(&self) -> PathBuf {
        expand_tilde(&self.storage.snapshot_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
