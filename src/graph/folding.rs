//! Folded-space ("wormhole") linking.
//!
//! Position space is treated as reflecting off walls `L` apart, so a scalar
//! coordinate `x` is seen as the triangle wave [`fold`]. Two nodes whose
//! position magnitudes coincide after some number of reflections are linked
//! even when they sit far apart in raw Euclidean terms.
//!
//! Sampling based: when the store has more than `sample_size` distinct pairs,
//! `sample_size` random pairs are examined instead of all of them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use super::store::TensorGraphStore;
use super::types::{Edge, EdgeKind, PassControl};
use crate::config::FoldingConfig;
use crate::error::{Result, StoreError};

/// Pairs examined between cancellation checks.
const CHECK_EVERY: usize = 4096;

#[derive(Debug, Clone, Serialize)]
pub struct FoldReport {
    pub pairs_examined: usize,
    pub exhaustive: bool,
    pub wormholes_added: usize,
}

/// Triangle-wave fold of `x` into `[0, L]`.
///
/// This is the reference transform. [`fold_space`](TensorGraphStore::fold_space)
/// never folds coordinates directly: [`folded_distance`] walks the mirror
/// images from [`virtual_target`] instead, and every mirror image folds back
/// onto the original point.
pub fn fold(x: f32, boundary: f32) -> f32 {
    boundary - (x.rem_euclid(2.0 * boundary) - boundary).abs()
}

/// Mirror image of `target` after `reflections` bounces off walls `boundary` apart.
pub fn virtual_target(target: f32, reflections: u32, boundary: f32) -> f32 {
    if reflections % 2 == 0 {
        reflections as f32 * boundary + target
    } else {
        (reflections + 1) as f32 * boundary - target
    }
}

/// Signed folded distance from `start` to `target`: the smallest-magnitude
/// `virtual_target - start` over `0..=max_reflections` reflections.
pub fn folded_distance(start: f32, target: f32, boundary: f32, max_reflections: u32) -> f32 {
    (0..=max_reflections)
        .map(|n| virtual_target(target, n, boundary) - start)
        .min_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(target - start)
}

impl TensorGraphStore {
    /// Add low-weight wormhole edges between raw-distant, fold-adjacent pairs.
    /// A pair already joined by a wormhole (either direction) is not linked again.
    pub fn fold_space(&self, config: &FoldingConfig, control: PassControl<'_>) -> Result<FoldReport> {
        // Positions and the existing wormhole set are copied so the scan runs
        // without holding the read lock.
        let (started, positions, mut linked) = {
            let state = self.read()?;
            let linked: HashSet<(usize, usize)> = state
                .edges
                .iter()
                .filter(|e| e.kind == EdgeKind::Wormhole)
                .map(|e| (e.source.min(e.target), e.source.max(e.target)))
                .collect();
            (state.generation, state.positions.clone(), linked)
        };

        let (found, examined, exhaustive) = {
            let n = positions.nrows();
            let magnitudes: Vec<f32> = positions
                .rows()
                .into_iter()
                .map(|r| r.dot(&r).sqrt())
                .collect();

            let total_pairs = n * n.saturating_sub(1) / 2;
            let exhaustive = total_pairs <= config.sample_size;
            let pairs: Vec<(usize, usize)> = if exhaustive {
                (0..n)
                    .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
                    .collect()
            } else {
                let mut rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                (0..config.sample_size)
                    .map(|_| {
                        let i = rng.random_range(0..n);
                        let mut j = rng.random_range(0..n - 1);
                        if j >= i {
                            j += 1;
                        }
                        (i.min(j), i.max(j))
                    })
                    .collect()
            };

            let mut found = Vec::new();
            for (done, &(i, j)) in pairs.iter().enumerate() {
                if done % CHECK_EVERY == 0 {
                    if control.is_cancelled() {
                        return Err(StoreError::Cancelled {
                            done,
                            total: pairs.len(),
                        });
                    }
                    control.report(done, pairs.len());
                }
                let delta = &positions.row(j) - &positions.row(i);
                let raw = delta.dot(&delta).sqrt();
                if raw < config.min_raw_distance {
                    continue;
                }
                let folded = folded_distance(
                    magnitudes[i],
                    magnitudes[j],
                    config.boundary,
                    config.max_reflections,
                );
                if folded.abs() < config.threshold && linked.insert((i, j)) {
                    found.push(Edge {
                        source: i,
                        target: j,
                        weight: config.weight,
                        kind: EdgeKind::Wormhole,
                    });
                }
            }
            control.report(pairs.len(), pairs.len());
            (found, pairs.len(), exhaustive)
        };

        let mut state = self.write()?;
        if state.generation != started {
            return Err(StoreError::Concurrent {
                started,
                current: state.generation,
            });
        }
        let wormholes_added = found.len();
        state.edges.extend(found);

        debug!(pairs = examined, exhaustive, "fold pass committed");
        if wormholes_added > 0 {
            info!(wormholes_added, "wormhole links formed");
        }
        Ok(FoldReport {
            pairs_examined: examined,
            exhaustive,
            wormholes_added,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_is_a_triangle_wave() {
        assert_eq!(fold(0.0, 10.0), 0.0);
        assert_eq!(fold(5.0, 10.0), 5.0);
        assert_eq!(fold(10.0, 10.0), 10.0);
        assert_eq!(fold(15.0, 10.0), 5.0);
        assert_eq!(fold(20.0, 10.0), 0.0);
        assert_eq!(fold(-5.0, 10.0), 5.0);
    }

    #[test]
    fn virtual_target_alternates_parity() {
        assert_eq!(virtual_target(3.0, 0, 10.0), 3.0);
        assert_eq!(virtual_target(3.0, 1, 10.0), 17.0);
        assert_eq!(virtual_target(3.0, 2, 10.0), 23.0);
        assert_eq!(virtual_target(3.0, 3, 10.0), 37.0);
    }

    #[test]
    fn mirror_images_fold_back_to_the_target() {
        for target in [0.0f32, 1.0, 3.5, 9.0, 10.0] {
            for n in 0..6 {
                let image = virtual_target(target, n, 10.0);
                assert!(
                    (fold(image, 10.0) - target).abs() < 1e-4,
                    "image {image} of {target} after {n} reflections"
                );
            }
        }
    }

    #[test]
    fn one_reflection_closes_the_gap() {
        assert_eq!(folded_distance(1.0, 19.0, 10.0, 4), 0.0);
        assert_eq!(folded_distance(19.0, 1.0, 10.0, 4), 0.0);
        assert_eq!(folded_distance(1.0, 19.0, 10.0, 0), 18.0);
    }
}
