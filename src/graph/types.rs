//! Core type definitions for the hot tier.
//!
//! Defines [`NodeHandle`] (a generation-checked index), [`Edge`] and
//! [`EdgeKind`], the tagged [`NodeMetadata`] schema, [`ColdRecord`] (the
//! link-less payload that migrates to the cold tier), and [`IdPolicy`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Number of spatial dimensions every node position has.
pub const POSITION_DIM: usize = 4;

/// A node's spatial embedding, independent of its feature vector.
pub type Position = [f32; POSITION_DIM];

/// Opaque reference to a hot-tier slot.
///
/// Only the store hands these out. A handle is valid until the next
/// compaction; after that the store rejects it with
/// [`StoreError::StaleHandle`](crate::error::StoreError::StaleHandle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

impl NodeHandle {
    /// Dense index at the time the handle was issued.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Compaction generation the handle belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Where an edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Added by a collaborator through `add_edge`.
    Explicit,
    /// Produced by the batched top-K cosine pass. Replaced on every pass.
    Similarity,
    /// Produced by the folded-space linker.
    Wormhole,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Similarity => "similarity",
            Self::Wormhole => "wormhole",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, weighted edge between two dense indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub weight: f32,
    pub kind: EdgeKind,
}

/// Where a node came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Producer label, e.g. `"bootstrap"`, `"dialogue"`, `"cold_recall"`.
    pub source: String,
    /// Category label from the producing corpus, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<String>,
}

/// The structured metadata shapes a node may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Annotation {
    Provenance(Provenance),
    /// Short text payload shown alongside the node.
    Snippet(String),
    /// Display color tag (e.g. `"#ff8800"`).
    Color(String),
}

impl Annotation {
    fn same_kind(&self, other: &Annotation) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Per-node metadata: structured annotations plus an unstructured overflow map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Anything that doesn't fit an [`Annotation`] shape.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NodeMetadata {
    pub fn with_provenance(source: &str, category: Option<&str>) -> Self {
        Self {
            annotations: vec![Annotation::Provenance(Provenance {
                source: source.to_string(),
                category: category.map(str::to_string),
            })],
            extra: serde_json::Map::new(),
        }
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Provenance(p) => Some(p),
            _ => None,
        })
    }

    /// Overlay `other` onto `self`. Annotations of a kind present in `other`
    /// replace ours; `extra` keys are overwritten key by key.
    ///
    /// A node holds at most one annotation per kind. If `other` carries
    /// several of the same kind, the last one wins.
    pub fn merge(&mut self, other: NodeMetadata) {
        for incoming in other.annotations {
            self.annotations.retain(|a| !a.same_kind(&incoming));
            self.annotations.push(incoming);
        }
        for (k, v) in other.extra {
            self.extra.insert(k, v);
        }
    }
}

/// A hot-tier node flattened for the cold tier. Position, index and edges
/// are not carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColdRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: NodeMetadata,
    pub mass: f32,
}

/// Result of fitting a vector to a fixed dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub values: Vec<f32>,
    /// Length before padding or truncation.
    pub original_len: usize,
    /// NaN or infinite entries replaced with 0.
    pub non_finite: usize,
}

impl Coerced {
    pub fn was_coerced(&self) -> bool {
        self.original_len != self.values.len() || self.non_finite > 0
    }
}

/// Lenient ingestion: zero-pad short inputs, truncate long ones to `dim`,
/// and zero any NaN or infinite entry.
///
/// Never fails. Callers decide whether to log; [`fit_vector`] does.
pub fn coerce_to_dim(values: &[f32], dim: usize) -> Coerced {
    let mut out = values.to_vec();
    out.resize(dim, 0.0);
    let mut non_finite = 0;
    for x in out.iter_mut().filter(|x| !x.is_finite()) {
        *x = 0.0;
        non_finite += 1;
    }
    Coerced {
        values: out,
        original_len: values.len(),
        non_finite,
    }
}

/// [`coerce_to_dim`] plus a warning when the input didn't fit.
pub(crate) fn fit_vector(values: &[f32], dim: usize, what: &str, id: &str) -> Coerced {
    let coerced = coerce_to_dim(values, dim);
    if coerced.original_len != dim {
        warn!(
            node = id,
            field = what,
            got = coerced.original_len,
            expected = dim,
            "dimension mismatch, coerced"
        );
    }
    if coerced.non_finite > 0 {
        warn!(
            node = id,
            field = what,
            count = coerced.non_finite,
            "non-finite values replaced with 0"
        );
    }
    coerced
}

/// `value` if finite, else 0 with a warning. Masses and edge weights go
/// through this so a snapshot never holds a value JSON can't represent.
pub(crate) fn finite_or_zero(value: f32, what: &str, id: &str) -> f32 {
    if value.is_finite() {
        value
    } else {
        warn!(node = id, field = what, %value, "non-finite value replaced with 0");
        0.0
    }
}

/// Predicate deciding which ids the store accepts. Sanitization itself is a
/// collaborator concern; the store only enforces the verdict.
pub struct IdPolicy(Box<dyn Fn(&str) -> bool + Send + Sync>);

impl IdPolicy {
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Box::new(predicate))
    }

    pub fn accepts(&self, id: &str) -> bool {
        (self.0)(id)
    }
}

impl Default for IdPolicy {
    /// Non-blank, no control characters.
    fn default() -> Self {
        Self::new(|id| !id.trim().is_empty() && !id.chars().any(char::is_control))
    }
}

impl std::fmt::Debug for IdPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdPolicy(..)")
    }
}

/// Cancellation and progress hooks for long-running passes.
#[derive(Default, Clone, Copy)]
pub struct PassControl<'a> {
    pub cancel: Option<&'a AtomicBool>,
    pub progress: Option<&'a (dyn Fn(usize, usize) + Sync)>,
}

impl<'a> PassControl<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }

    pub(crate) fn report(&self, done: usize, total: usize) {
        if let Some(progress) = self.progress {
            progress(done, total);
        }
    }
}
