//! Dimensionality reduction ahead of density clustering.
//!
//! Density estimates degrade quickly in the several-hundred-dimensional
//! spaces produced by sentence encoders, so density mode first projects the
//! embeddings onto a handful of coordinates that preserve neighborhoods.
//!
//! # Laplacian Eigenmaps
//!
//! ```text
//! Embeddings → kNN graph (petgraph) → normalized affinity → leading eigenvectors
//! ```
//!
//! 1. Connect every point to its `n_neighbors` nearest neighbors. Edge weights
//!    use a self-tuning Gaussian kernel `w_ij = exp(-d²/(σ_i σ_j))`, where `σ_i`
//!    is the distance from `i` to its farthest kept neighbor.
//! 2. Form `S = ½ (I + D^{-1/2} W D^{-1/2})`; its eigenvalues lie in `[0, 1]`
//!    and its leading eigenvectors are the smoothest functions on the graph.
//! 3. Seeded subspace iteration recovers the `target_dim` leading eigenvectors
//!    after the trivial one `D^{1/2} 1`.
//! 4. Coordinates are `y_i = q_i / sqrt(d_i)`.
//!
//! Neighborhood graphs are sensitive to input order and to the random
//! starting subspace. Neighbor ties resolve to the lowest index and the
//! starting subspace comes from a `StdRng` seeded by the caller, so identical
//! input, order and seed give identical output.
//!
//! Iteration is capped (`max_iter`, plus an optional deadline); hitting the cap
//! returns the current subspace with `converged = false`.

use crate::cluster::util::check_dimensions;
use crate::distance::{pairwise_distances, Metric};
use crate::error::{Error, Result};
use crate::store::ResponseVector;
use ndarray::{Array1, Array2, Axis};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::prelude::*;
use std::time::Instant;
use tracing::{debug, warn};

/// Absolute floor on the number of samples needed to build a useful graph.
pub const MIN_SAMPLES_FLOOR: usize = 5;

/// Minimum number of samples required to reduce to `target_dim` dimensions.
pub fn min_samples_for(target_dim: usize) -> usize {
    (target_dim + 2).max(MIN_SAMPLES_FLOOR)
}

/// A projected response vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedVector {
    /// Id of the source [`ResponseVector`].
    pub id: u64,
    /// Projected coordinates (length `target_dim`).
    pub vector: Vec<f32>,
}

/// Output of a reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    /// One projected vector per input, in input order.
    pub vectors: Vec<ReducedVector>,
    /// Whether the eigen-solver converged before its cap.
    pub converged: bool,
    /// Solver iterations run.
    pub iterations: usize,
    /// Connected components of the neighborhood graph.
    pub graph_components: usize,
}

/// Projects embeddings into a lower-dimensional space.
pub trait DimensionReducer {
    /// Reduce `vectors` to `target_dim` coordinates.
    ///
    /// Fails with [`Error::InsufficientSamples`] when fewer than
    /// [`min_samples_for`]`(target_dim)` vectors are given. Callers decide
    /// what to do instead; this method never falls back silently.
    fn reduce(&self, vectors: &[ResponseVector], target_dim: usize, seed: u64) -> Result<Reduction>;
}

/// Spectral (Laplacian eigenmap) reducer over a kNN graph.
#[derive(Debug, Clone)]
pub struct SpectralReducer {
    n_neighbors: usize,
    metric: Metric,
    max_iter: usize,
    tol: f64,
    deadline: Option<Instant>,
}

impl Default for SpectralReducer {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            metric: Metric::Cosine,
            max_iter: 300,
            tol: 1e-6,
            deadline: None,
        }
    }
}

impl SpectralReducer {
    /// Create a reducer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of graph neighbors per point.
    pub fn with_n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = n_neighbors;
        self
    }

    /// Set the metric used to find neighbors.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the eigen-solver iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the subspace convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Stop iterating once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Build the symmetric kNN graph. Node weights are input positions.
    fn knn_graph(&self, data: &[Vec<f32>]) -> UnGraph<usize, f64> {
        let n = data.len();
        let k = self.n_neighbors.clamp(1, n - 1);
        let dists = pairwise_distances(self.metric, data);

        let neighbors: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                let mut order: Vec<usize> = (0..n).filter(|&j| j != i).collect();
                order.sort_by(|&a, &b| dists[[i, a]].total_cmp(&dists[[i, b]]).then(a.cmp(&b)));
                order.truncate(k);
                order
            })
            .collect();

        let sigma: Vec<f64> = neighbors
            .iter()
            .enumerate()
            .map(|(i, nb)| {
                let last = nb.last().map_or(0.0, |&j| dists[[i, j]] as f64);
                last.max(1e-6)
            })
            .collect();

        let mut graph = UnGraph::<usize, f64>::with_capacity(n, n * k);
        let nodes: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();

        for (i, nb) in neighbors.iter().enumerate() {
            for &j in nb {
                let d = dists[[i, j]] as f64;
                let w = (-d * d / (sigma[i] * sigma[j])).exp().max(1e-10);
                match graph.find_edge(nodes[i], nodes[j]) {
                    Some(e) => {
                        if w > graph[e] {
                            graph[e] = w;
                        }
                    }
                    None => {
                        graph.add_edge(nodes[i], nodes[j], w);
                    }
                }
            }
        }
        graph
    }
}

impl DimensionReducer for SpectralReducer {
    fn reduce(&self, vectors: &[ResponseVector], target_dim: usize, seed: u64) -> Result<Reduction> {
        if vectors.is_empty() {
            return Err(Error::EmptyInput);
        }
        if target_dim == 0 {
            return Err(Error::InvalidParameter {
                name: "target_dim",
                message: "must be at least 1",
            });
        }
        let n = vectors.len();
        let required = min_samples_for(target_dim);
        if n < required {
            return Err(Error::InsufficientSamples {
                n_items: n,
                required,
            });
        }

        let data: Vec<Vec<f32>> = vectors.iter().map(|v| v.vector.clone()).collect();
        check_dimensions(&data)?;
        for v in vectors {
            self.metric.validate(v.id, &v.vector)?;
        }

        let graph = self.knn_graph(&data);
        let graph_components = connected_components(&graph);
        if graph_components > 1 {
            debug!(components = graph_components, "neighborhood graph is disconnected");
        }

        let mut degree = Array1::<f64>::zeros(n);
        for e in graph.edge_references() {
            degree[graph[e.source()]] += *e.weight();
            degree[graph[e.target()]] += *e.weight();
        }
        let inv_sqrt_deg = degree.mapv(|d| 1.0 / d.max(1e-12).sqrt());

        // Off-diagonal part of S = ½ (I + D^{-1/2} W D^{-1/2}).
        let edges: Vec<(usize, usize, f64)> = graph
            .edge_references()
            .map(|e| {
                let (a, b) = (graph[e.source()], graph[e.target()]);
                (a, b, 0.5 * e.weight() * inv_sqrt_deg[a] * inv_sqrt_deg[b])
            })
            .collect();

        let mut trivial = degree.mapv(f64::sqrt);
        let norm = trivial.dot(&trivial).sqrt();
        trivial /= norm.max(1e-12);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut q = Array2::from_shape_simple_fn((n, target_dim), || rng.random::<f64>() - 0.5);
        orthonormalize(&mut q, &trivial);

        let mut converged = false;
        let mut iterations = 0;
        while iterations < self.max_iter {
            iterations += 1;
            let mut z = apply_operator(&edges, &q);
            orthonormalize(&mut z, &trivial);

            let projection = q.dot(&q.t().dot(&z));
            let delta = (&z - &projection).mapv(|x| x * x).sum().sqrt();
            q = z;

            if delta < self.tol {
                converged = true;
                break;
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
        }

        if converged {
            debug!(iterations, target_dim, "spectral reduction converged");
        } else {
            warn!(iterations, target_dim, "spectral reduction hit its iteration cap");
        }

        // Fix each eigenvector's sign so its largest entry is positive.
        for mut col in q.axis_iter_mut(Axis(1)) {
            let pivot = col
                .iter()
                .copied()
                .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
            if pivot < 0.0 {
                col.mapv_inplace(|x| -x);
            }
        }

        let reduced = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| ReducedVector {
                id: v.id,
                vector: q.row(i).iter().map(|&x| (x * inv_sqrt_deg[i]) as f32).collect(),
            })
            .collect();

        Ok(Reduction {
            vectors: reduced,
            converged,
            iterations,
            graph_components,
        })
    }
}

/// `S · q` using the sparse edge list.
fn apply_operator(edges: &[(usize, usize, f64)], q: &Array2<f64>) -> Array2<f64> {
    let mut z = q * 0.5;
    let cols = q.ncols();
    for &(a, b, w) in edges {
        for c in 0..cols {
            z[[a, c]] += w * q[[b, c]];
            z[[b, c]] += w * q[[a, c]];
        }
    }
    z
}

/// Modified Gram-Schmidt on the columns of `q`, all kept orthogonal to `fixed`.
fn orthonormalize(q: &mut Array2<f64>, fixed: &Array1<f64>) {
    let (n, cols) = q.dim();
    for c in 0..cols {
        let mut col = q.column(c).to_owned();
        let mut norm = project_out(&mut col, q, c, fixed);

        // Degenerate column: fall back to basis vectors until one survives.
        let mut basis = 0;
        while norm < 1e-10 && basis < n {
            col.fill(0.0);
            col[(basis + c) % n] = 1.0;
            norm = project_out(&mut col, q, c, fixed);
            basis += 1;
        }

        q.column_mut(c).assign(&(col / norm.max(1e-12)));
    }
}

fn project_out(col: &mut Array1<f64>, q: &Array2<f64>, upto: usize, fixed: &Array1<f64>) -> f64 {
    let p = col.dot(fixed);
    col.scaled_add(-p, fixed);
    for prev in 0..upto {
        let basis = q.column(prev);
        let p = col.dot(&basis);
        col.scaled_add(-p, &basis);
    }
    col.dot(&*col).sqrt()
}
