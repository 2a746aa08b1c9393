//! The hot tier and the passes that run over it.
//!
//! [`TensorGraphStore`] owns the dense arrays; the sibling modules add its
//! operations: similarity linking, layout, folded-space linking, metabolism
//! and tiering, and persistence. [`SnapshotCompressor`] is independent.

pub mod folding;
pub mod layout;
pub mod maintenance;
pub mod persistence;
pub mod similarity;
pub mod snapshot;
pub mod store;
pub mod types;

pub use layout::Attractor;
pub use snapshot::{SeedReading, SnapshotCompressor, SEED_DIM};
pub use store::{EdgeView, GraphStats, NodeView, TensorGraphStore};
pub use types::{
    Annotation, ColdRecord, Edge, EdgeKind, IdPolicy, NodeHandle, NodeMetadata, PassControl,
    Position, Provenance,
};
