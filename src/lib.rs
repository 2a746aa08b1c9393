//! Tiered, similarity-linked vector/graph store.
//!
//! A hot tier keeps every live node in dense arrays (feature vector, 4-D
//! position, mass, snapshot seed) alongside a weighted edge list. Nodes whose
//! mass falls low enough are either pruned outright or migrated to a cold
//! tier in SQLite when the hot tier runs over capacity.
//!
//! | Pass | What it does | Cost |
//! |------|--------------|------|
//! | `ignite_gravity` | batched top-K cosine linking | O(N·B) memory, O(N²·D / B) batches |
//! | `apply_gravity` | force-directed position relaxation | O(N²) per iteration |
//! | `fold_space` | wormhole links via reflected distances | O(sample) |
//! | `apply_metabolism` | mass decay + prune + compaction | O(N + E) |
//! | `optimize_memory` | lowest-mass migration to cold + compaction | O(N + E) |
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks for the cold tier
//! - [`cold`]: The cold tier: absorb/radiate of evicted node payloads
//! - [`graph`]: The hot tier and its passes
//! - [`error`]: The library error type

pub mod cold;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;

pub use cold::ColdStore;
pub use error::{Result, StoreError};
pub use graph::TensorGraphStore;
