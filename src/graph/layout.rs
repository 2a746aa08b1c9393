//! Force-directed relaxation of node positions ("gravity pass").
//!
//! Each iteration computes, for every node, the sum of:
//! - attraction toward every node whose vector cosine similarity exceeds
//!   `similarity_threshold`, scaled by that similarity;
//! - repulsion away from every node closer than `min_distance`;
//! - a pull toward each [`Attractor`], proportional to the linear distance.
//!
//! Forces for the whole iteration are computed before any position moves.
//! The pass is O(N²) per iteration and refuses to run above `max_nodes`.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::similarity::l2_normalize_rows;
use super::store::TensorGraphStore;
use super::types::{PassControl, Position, POSITION_DIM};
use crate::config::LayoutConfig;
use crate::error::{Result, StoreError};

/// A named point in position space that pulls every node toward it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attractor {
    pub name: String,
    pub position: Position,
    pub strength: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutReport {
    pub nodes: usize,
    pub iterations: usize,
    /// Mean displacement of a node over the whole pass.
    pub mean_displacement: f32,
    /// `true` if the store was above `max_nodes` and nothing moved.
    pub skipped: bool,
}

const EPSILON: f32 = 1e-6;

/// Net force on every node for one iteration.
fn forces(
    positions: ArrayView2<f32>,
    similarity: ArrayView2<f32>,
    attractors: &[Attractor],
    config: &LayoutConfig,
) -> Array2<f32> {
    let n = positions.nrows();
    let mut force = Array2::<f32>::zeros((n, POSITION_DIM));

    for i in 0..n {
        let pi = positions.row(i);
        let mut total = Array1::<f32>::zeros(POSITION_DIM);
        for j in 0..n {
            if i == j {
                continue;
            }
            let delta = &positions.row(j) - &pi;
            let dist = delta.dot(&delta).sqrt();

            let sim = similarity[[i, j]];
            if sim > config.similarity_threshold {
                total.scaled_add(config.attraction * sim, &delta);
            }
            if dist < config.min_distance {
                let push = config.repulsion * (config.min_distance - dist);
                if dist > EPSILON {
                    total.scaled_add(-push / dist, &delta);
                } else {
                    // Coincident points: separate along a per-pair axis.
                    let axis = (i + j) % POSITION_DIM;
                    let sign = if i < j { -1.0 } else { 1.0 };
                    total[axis] += sign * push;
                }
            }
        }
        for attractor in attractors {
            let target = Array1::from(attractor.position.to_vec());
            total.scaled_add(attractor.strength, &(&target - &pi));
        }
        force.row_mut(i).assign(&total);
    }
    force
}

impl TensorGraphStore {
    /// Run `config.iterations` relaxation steps over node positions.
    pub fn apply_gravity(
        &self,
        config: &LayoutConfig,
        attractors: &[Attractor],
        control: PassControl<'_>,
    ) -> Result<LayoutReport> {
        let (started, mut positions, similarity) = {
            let state = self.read()?;
            let n = state.len();
            if n > config.max_nodes {
                warn!(nodes = n, max = config.max_nodes, "layout skipped: store too large");
                return Ok(LayoutReport {
                    nodes: n,
                    iterations: 0,
                    mean_displacement: 0.0,
                    skipped: true,
                });
            }
            let normed = l2_normalize_rows(state.vectors.view());
            let similarity = normed.dot(&normed.t());
            (state.generation, state.positions.clone(), similarity)
        };

        let n = positions.nrows();
        let original = positions.clone();
        for iteration in 0..config.iterations {
            if control.is_cancelled() {
                return Err(StoreError::Cancelled {
                    done: iteration,
                    total: config.iterations,
                });
            }
            let step = forces(positions.view(), similarity.view(), attractors, config);
            positions.scaled_add(config.learning_rate, &step);
            control.report(iteration + 1, config.iterations);
        }

        let mean_displacement = if n == 0 {
            0.0
        } else {
            (&positions - &original)
                .map_axis(Axis(1), |d| d.dot(&d).sqrt())
                .sum()
                / n as f32
        };

        let mut state = self.write()?;
        if state.generation != started {
            return Err(StoreError::Concurrent {
                started,
                current: state.generation,
            });
        }
        // Nodes appended during the pass keep their positions.
        state
            .positions
            .slice_mut(ndarray::s![..n, ..])
            .assign(&positions);

        debug!(nodes = n, iterations = config.iterations, mean_displacement, "layout committed");
        Ok(LayoutReport {
            nodes: n,
            iterations: config.iterations,
            mean_displacement,
            skipped: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LayoutConfig {
        LayoutConfig {
            iterations: 1,
            learning_rate: 0.1,
            similarity_threshold: 0.5,
            min_distance: 1.0,
            attraction: 1.0,
            repulsion: 1.0,
            max_nodes: 100,
        }
    }

    fn distance(store: &TensorGraphStore, a: &str, b: &str) -> f32 {
        let pa = store.node(a).unwrap().unwrap().position;
        let pb = store.node(b).unwrap().unwrap().position;
        pa.iter().zip(pb).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
    }

    #[test]
    fn similar_nodes_attract() {
        let store = TensorGraphStore::new(2);
        store.add_node("a", Some(&[1.0, 0.0]), Some(&[0.0, 0.0, 0.0, 0.0]), None).unwrap();
        store.add_node("b", Some(&[1.0, 0.0]), Some(&[5.0, 0.0, 0.0, 0.0]), None).unwrap();
        let before = distance(&store, "a", "b");
        store.apply_gravity(&config(), &[], PassControl::none()).unwrap();
        assert!(distance(&store, "a", "b") < before);
    }

    #[test]
    fn close_dissimilar_nodes_repel() {
        let store = TensorGraphStore::new(2);
        store.add_node("a", Some(&[1.0, 0.0]), Some(&[0.0, 0.0, 0.0, 0.0]), None).unwrap();
        store.add_node("b", Some(&[0.0, 1.0]), Some(&[0.2, 0.0, 0.0, 0.0]), None).unwrap();
        let before = distance(&store, "a", "b");
        store.apply_gravity(&config(), &[], PassControl::none()).unwrap();
        assert!(distance(&store, "a", "b") > before);
    }

    #[test]
    fn coincident_nodes_separate() {
        let store = TensorGraphStore::new(2);
        store.add_node("a", Some(&[1.0, 0.0]), None, None).unwrap();
        store.add_node("b", Some(&[0.0, 1.0]), None, None).unwrap();
        store.apply_gravity(&config(), &[], PassControl::none()).unwrap();
        assert!(distance(&store, "a", "b") > 0.0);
    }

    #[test]
    fn attractor_pulls_nodes() {
        let store = TensorGraphStore::new(2);
        store.add_node("a", Some(&[1.0, 0.0]), Some(&[0.0, 0.0, 0.0, 0.0]), None).unwrap();
        let well = Attractor {
            name: "well".into(),
            position: [10.0, 0.0, 0.0, 0.0],
            strength: 0.5,
        };
        store.apply_gravity(&config(), &[well], PassControl::none()).unwrap();
        let x = store.node("a").unwrap().unwrap().position[0];
        assert!((x - 0.5).abs() < 1e-5, "0.1 * 0.5 * 10 = 0.5, got {x}");
    }

    #[test]
    fn oversized_store_is_skipped() {
        let store = TensorGraphStore::new(2);
        for i in 0..3 {
            store.add_node(&format!("n{i}"), None, None, None).unwrap();
        }
        let mut cfg = config();
        cfg.max_nodes = 2;
        let report = store.apply_gravity(&cfg, &[], PassControl::none()).unwrap();
        assert!(report.skipped);
    }
}
