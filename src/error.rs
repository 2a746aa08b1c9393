//! Error type for the hot and cold tiers.
//!
//! Ingestion problems (dimension mismatches, malformed bootstrap items) never
//! surface here: they are coerced or skipped and logged. What does surface is
//! anything that would leave the index space inconsistent if ignored.

use thiserror::Error;

/// Errors returned by the graph store, cold store and persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The id was rejected by the store's [`IdPolicy`](crate::graph::types::IdPolicy).
    #[error("invalid node id: {0:?}")]
    InvalidId(String),

    /// No hot-tier node has this id.
    #[error("node not found: {0}")]
    UnknownNode(String),

    /// The handle was issued before a compaction renumbered the index space.
    #[error("stale node handle: issued at generation {issued}, store is at {current}")]
    StaleHandle { issued: u64, current: u64 },

    /// A persisted bundle or cold record does not match the store's fixed dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A snapshot failed validation and was not loaded.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// A cold-tier row could not be decoded.
    #[error("corrupt cold record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    /// A long-running pass was cancelled before commit. Nothing was written.
    #[error("pass cancelled after {done}/{total} batches")]
    Cancelled { done: usize, total: usize },

    /// A compaction ran between the compute and commit phases of a pass.
    #[error("index space changed during pass (generation {started} -> {current})")]
    Concurrent { started: u64, current: u64 },

    /// Tiering was requested on a store that has no cold tier attached.
    #[error("no cold tier attached")]
    NoColdTier,

    /// A lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
