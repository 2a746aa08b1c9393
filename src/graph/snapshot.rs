//! Whole-store context compression into a fixed-size seed.
//!
//! Layout of a seed: `[0..30)` vector centroid, `[30..60)` vector spread
//! (column variance), `[60..64)` position centroid. Vector columns beyond 30
//! are ignored; stores with fewer than 30 dimensions leave the tail zeroed.

use ndarray::{ArrayView2, Axis};
use serde::Serialize;

use super::types::POSITION_DIM;

const CENTROID_DIMS: usize = 30;
const SPREAD_DIMS: usize = 30;

/// Length of every snapshot seed.
pub const SEED_DIM: usize = CENTROID_DIMS + SPREAD_DIMS + POSITION_DIM;

/// Qualitative bucket for one axis of a seed reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Moderate,
    High,
}

impl Level {
    fn bucket(value: f32, moderate: f32, high: f32) -> Self {
        if value > high {
            Self::High
        } else if value > moderate {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

/// Lossy, descriptive reading of a seed along energy, entropy and expansion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeedReading {
    /// Magnitude of the vector centroid.
    pub energy: Level,
    /// Mean per-column variance of the vectors.
    pub entropy: Level,
    /// Distance of the position centroid from the origin.
    pub expansion: Level,
}

impl std::fmt::Display for SeedReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mood = match (self.energy, self.entropy) {
            (Level::High, Level::Low) => "focused",
            (Level::High, _) => "agitated",
            (Level::Low, Level::High) => "scattered",
            (Level::Low, _) => "quiet",
            (Level::Moderate, _) => "steady",
        };
        write!(
            f,
            "{mood} context (energy {}, entropy {}, expansion {})",
            self.energy.as_str(),
            self.entropy.as_str(),
            self.expansion.as_str()
        )
    }
}

pub struct SnapshotCompressor;

impl SnapshotCompressor {
    /// Summarise the current hot tier. An empty store yields an all-zero seed.
    pub fn capture(positions: ArrayView2<f32>, vectors: ArrayView2<f32>) -> Vec<f32> {
        let mut seed = vec![0.0f32; SEED_DIM];
        if vectors.nrows() == 0 {
            return seed;
        }

        let cols = vectors.ncols().min(CENTROID_DIMS);
        if let Some(mean) = vectors.mean_axis(Axis(0)) {
            for (slot, v) in seed[..cols].iter_mut().zip(mean.iter()) {
                *slot = *v;
            }
        }
        let variance = vectors.var_axis(Axis(0), 0.0);
        for (slot, v) in seed[CENTROID_DIMS..CENTROID_DIMS + cols]
            .iter_mut()
            .zip(variance.iter())
        {
            *slot = *v;
        }
        if let Some(mean) = positions.mean_axis(Axis(0)) {
            for (slot, v) in seed[CENTROID_DIMS + SPREAD_DIMS..].iter_mut().zip(mean.iter()) {
                *slot = *v;
            }
        }
        seed
    }

    pub fn reconstruct(seed: &[f32]) -> SeedReading {
        let slice = |range: std::ops::Range<usize>| {
            let end = range.end.min(seed.len());
            &seed[range.start.min(end)..end]
        };
        let norm = |xs: &[f32]| xs.iter().map(|x| x * x).sum::<f32>().sqrt();

        let centroid = slice(0..CENTROID_DIMS);
        let spread = slice(CENTROID_DIMS..CENTROID_DIMS + SPREAD_DIMS);
        let origin = slice(CENTROID_DIMS + SPREAD_DIMS..SEED_DIM);

        let mean_spread = if spread.is_empty() {
            0.0
        } else {
            spread.iter().sum::<f32>() / spread.len() as f32
        };

        SeedReading {
            energy: Level::bucket(norm(centroid), 0.1, 0.5),
            entropy: Level::bucket(mean_spread, 0.01, 0.1),
            expansion: Level::bucket(norm(origin), 1.0, 10.0),
        }
    }
}
