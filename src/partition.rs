//! Partitioning responses into clusters.
//!
//! [`PartitionEngine`] runs one of two strategies over a slice of
//! [`ResponseVector`]s and returns a [`Partition`] that assigns every input id
//! exactly once:
//!
//! | Mode | Algorithm | Clusters | Noise |
//! |------|-----------|----------|-------|
//! | [`Mode::Centroid`] | k-means | exactly `k` | never |
//! | [`Mode::Density`] | HDBSCAN | discovered | yes |
//!
//! Density mode may first project the vectors with a [`DimensionReducer`].
//! When there are too few samples for a neighborhood graph the engine clusters
//! the original vectors instead and records the fallback in
//! [`PartitionRun::reduction`].

use crate::cluster::{Hdbscan, Kmeans};
use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::reduce::{DimensionReducer, SpectralReducer};
use crate::store::ResponseVector;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Where a single response landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterAssignment {
    /// Member of the cluster with this id.
    Cluster(usize),
    /// Not dense enough to join any cluster.
    Noise,
}

impl ClusterAssignment {
    /// Cluster id, or `None` for noise.
    pub fn cluster_id(self) -> Option<usize> {
        match self {
            Self::Cluster(id) => Some(id),
            Self::Noise => None,
        }
    }

    /// Whether this is a noise assignment.
    pub fn is_noise(self) -> bool {
        matches!(self, Self::Noise)
    }
}

/// Which strategy produced a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    /// Fixed-K centroid clustering.
    Centroid,
    /// Density clustering with noise.
    Density,
}

/// Coarse shape of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionOutcome {
    /// At least one cluster was found.
    Clustered {
        /// Number of non-noise clusters.
        n_clusters: usize,
    },
    /// Density mode found no cluster; every response is noise.
    AllNoise,
}

/// Mapping from response id to [`ClusterAssignment`].
///
/// Entries keep input order. Cluster ids are contiguous from 0. Centroid ids
/// follow first appearance in input order; density ids follow discovery
/// during the linkage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    ids: Vec<u64>,
    assignments: Vec<ClusterAssignment>,
    n_clusters: usize,
    kind: PartitionKind,
    #[serde(skip)]
    index: HashMap<u64, usize>,
}

impl Partition {
    /// Build from per-position labels; `None` marks noise.
    pub(crate) fn from_labels(
        ids: Vec<u64>,
        labels: &[Option<usize>],
        n_clusters: usize,
        kind: PartitionKind,
    ) -> Self {
        let assignments = labels
            .iter()
            .map(|l| match l {
                Some(c) => ClusterAssignment::Cluster(*c),
                None => ClusterAssignment::Noise,
            })
            .collect();
        let index = ids.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();
        Self {
            ids,
            assignments,
            n_clusters,
            kind,
            index,
        }
    }

    /// Assignment for `id`, if it was part of the input.
    pub fn get(&self, id: u64) -> Option<ClusterAssignment> {
        self.index.get(&id).map(|&pos| self.assignments[pos])
    }

    /// `(id, assignment)` pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, ClusterAssignment)> + '_ {
        self.ids.iter().copied().zip(self.assignments.iter().copied())
    }

    /// Ids in input order.
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Member ids of `cluster_id` in input order.
    pub fn members(&self, cluster_id: usize) -> Vec<u64> {
        self.iter()
            .filter(|(_, a)| a.cluster_id() == Some(cluster_id))
            .map(|(id, _)| id)
            .collect()
    }

    /// Noise ids in input order.
    pub fn noise_ids(&self) -> Vec<u64> {
        self.iter().filter(|(_, a)| a.is_noise()).map(|(id, _)| id).collect()
    }

    /// Per-position labels, `None` for noise.
    pub fn labels(&self) -> Vec<Option<usize>> {
        self.assignments.iter().map(|a| a.cluster_id()).collect()
    }

    /// Number of non-noise clusters.
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Strategy that produced this partition.
    pub fn kind(&self) -> PartitionKind {
        self.kind
    }

    /// Number of assigned responses.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the partition is empty. Never true for engine output.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether every response is noise.
    pub fn is_all_noise(&self) -> bool {
        self.n_clusters == 0
    }

    /// Clustered vs. all-noise.
    pub fn outcome(&self) -> PartitionOutcome {
        if self.is_all_noise() {
            PartitionOutcome::AllNoise
        } else {
            PartitionOutcome::Clustered {
                n_clusters: self.n_clusters,
            }
        }
    }
}

/// Clustering strategy and its strategy-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// k-means with a fixed number of clusters.
    Centroid {
        /// Number of clusters, in `[2, N - 1]` (or 2 when `N = 2`).
        k: usize,
    },
    /// HDBSCAN.
    Density {
        /// Smallest group reported as a cluster.
        min_cluster_size: usize,
        /// Neighbor count for core distances; defaults to `min_cluster_size`.
        min_samples: Option<usize>,
        /// Allow the whole dataset to be reported as one cluster.
        allow_single_cluster: bool,
    },
}

impl Mode {
    /// Density mode with the given minimum cluster size and default settings.
    pub fn density(min_cluster_size: usize) -> Self {
        Self::Density {
            min_cluster_size,
            min_samples: None,
            allow_single_cluster: false,
        }
    }
}

/// Projection settings for density mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceParams {
    /// Output dimension.
    pub target_dim: usize,
    /// Neighbors per point in the graph.
    pub n_neighbors: usize,
}

impl Default for ReduceParams {
    fn default() -> Self {
        Self {
            target_dim: 5,
            n_neighbors: 15,
        }
    }
}

/// Parameters shared by both modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionParams {
    /// Seed for every stochastic step.
    pub seed: u64,
    /// Iteration cap for k-means and the reducer.
    pub max_iter: usize,
    /// k-means restarts.
    pub n_init: usize,
    /// Wall-clock cap for iterative steps.
    pub deadline: Option<Instant>,
    /// Reduce before density clustering. Ignored in centroid mode.
    pub reduce: Option<ReduceParams>,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            seed: 42,
            max_iter: 300,
            n_init: 4,
            deadline: None,
            reduce: None,
        }
    }
}

/// What happened to the optional reduction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ReductionStatus {
    /// No reduction was requested (or centroid mode).
    NotRequested,
    /// Vectors were projected before clustering.
    Applied {
        /// Projected dimension.
        dim: usize,
        /// Whether the reducer converged.
        converged: bool,
    },
    /// Too few samples; clustered the original vectors.
    SkippedInsufficientSamples {
        /// Number of inputs.
        n_items: usize,
        /// Minimum the reducer needs.
        required: usize,
    },
    /// Input dimension already at or below the target; clustered as is.
    SkippedLowDimension {
        /// Input dimension.
        dim: usize,
    },
}

impl ReductionStatus {
    /// Whether reduction was requested but clustering used raw vectors.
    pub fn fell_back(self) -> bool {
        matches!(
            self,
            Self::SkippedInsufficientSamples { .. } | Self::SkippedLowDimension { .. }
        )
    }
}

/// A partition plus how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionRun {
    /// The partition.
    pub partition: Partition,
    /// Centroids in the clustering space (centroid mode only).
    pub centroids: Option<Vec<Vec<f32>>>,
    /// False if any iterative step stopped at its cap.
    pub converged: bool,
    /// k-means iterations of the winning restart, or reducer iterations.
    pub iterations: usize,
    /// Within-cluster sum of squared distances (centroid mode only).
    pub inertia: Option<f64>,
    /// Reduction outcome.
    pub reduction: ReductionStatus,
}

/// Runs either clustering strategy behind one entry point.
#[derive(Clone)]
pub struct PartitionEngine {
    metric: Metric,
    reducer: Option<Arc<dyn DimensionReducer + Send + Sync>>,
}

impl std::fmt::Debug for PartitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionEngine")
            .field("metric", &self.metric)
            .field("custom_reducer", &self.reducer.is_some())
            .finish()
    }
}

impl Default for PartitionEngine {
    fn default() -> Self {
        Self::new(Metric::default())
    }
}

impl PartitionEngine {
    /// Create an engine using `metric` on the original vectors.
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            reducer: None,
        }
    }

    /// Replace the default [`SpectralReducer`].
    pub fn with_reducer(mut self, reducer: impl DimensionReducer + Send + Sync + 'static) -> Self {
        self.reducer = Some(Arc::new(reducer));
        self
    }

    /// Metric used on the original vectors.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Partition `vectors`.
    ///
    /// Structural errors are checked in order: [`Error::EmptyInput`],
    /// [`Error::DimensionMismatch`], [`Error::DuplicateId`],
    /// [`Error::InvalidMetric`], then
    /// [`Error::InvalidK`] (centroid mode).
    pub fn partition(
        &self,
        vectors: &[ResponseVector],
        mode: &Mode,
        params: &PartitionParams,
    ) -> Result<PartitionRun> {
        self.validate(vectors)?;
        let ids: Vec<u64> = vectors.iter().map(|v| v.id).collect();

        match *mode {
            Mode::Centroid { k } => {
                let n = vectors.len();
                if k < 2 || k > Kmeans::max_k(n) {
                    return Err(Error::InvalidK {
                        requested: k,
                        n_items: n,
                    });
                }
                let data: Vec<Vec<f32>> = vectors.iter().map(|v| v.vector.clone()).collect();
                self.centroid(ids, &data, k, params)
            }
            Mode::Density {
                min_cluster_size,
                min_samples,
                allow_single_cluster,
            } => {
                let mut hdbscan = Hdbscan::new()
                    .with_min_cluster_size(min_cluster_size)
                    .with_allow_single_cluster(allow_single_cluster);
                if let Some(ms) = min_samples {
                    hdbscan = hdbscan.with_min_samples(ms);
                }
                self.density(ids, vectors, &hdbscan, params)
            }
        }
    }

    pub(crate) fn validate(&self, vectors: &[ResponseVector]) -> Result<()> {
        let first = vectors.first().ok_or(Error::EmptyInput)?;
        let dim = first.vector.len();
        for v in vectors {
            if v.vector.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: v.vector.len(),
                });
            }
        }
        let mut seen = HashSet::with_capacity(vectors.len());
        for v in vectors {
            if !seen.insert(v.id) {
                return Err(Error::DuplicateId { id: v.id });
            }
        }
        for v in vectors {
            self.metric.validate(v.id, &v.vector)?;
        }
        Ok(())
    }

    /// k-means over `data` with the engine metric.
    pub(crate) fn centroid(
        &self,
        ids: Vec<u64>,
        data: &[Vec<f32>],
        k: usize,
        params: &PartitionParams,
    ) -> Result<PartitionRun> {
        let fit = Kmeans::new(k)
            .with_metric(self.metric)
            .with_seed(params.seed)
            .with_max_iter(params.max_iter)
            .with_n_init(params.n_init)
            .with_deadline(params.deadline)
            .fit(data)?;

        if !fit.converged {
            warn!(k, iterations = fit.iterations, "k-means hit its iteration cap");
        }

        let labels: Vec<Option<usize>> = fit.labels.iter().map(|&l| Some(l)).collect();
        Ok(PartitionRun {
            partition: Partition::from_labels(ids, &labels, k, PartitionKind::Centroid),
            centroids: Some(fit.centroids),
            converged: fit.converged,
            iterations: fit.iterations,
            inertia: Some(fit.inertia),
            reduction: ReductionStatus::NotRequested,
        })
    }

    fn density(
        &self,
        ids: Vec<u64>,
        vectors: &[ResponseVector],
        hdbscan: &Hdbscan,
        params: &PartitionParams,
    ) -> Result<PartitionRun> {
        let raw = || -> Vec<Vec<f32>> { vectors.iter().map(|v| v.vector.clone()).collect() };
        let dim = vectors.first().map_or(0, |v| v.vector.len());

        let (data, metric, reduction, iterations) = match params.reduce {
            None => (raw(), self.metric, ReductionStatus::NotRequested, 0),
            Some(rp) if dim <= rp.target_dim => {
                debug!(dim, target_dim = rp.target_dim, "input already low-dimensional, skipping reduction");
                (raw(), self.metric, ReductionStatus::SkippedLowDimension { dim }, 0)
            }
            Some(rp) => {
                let outcome = match &self.reducer {
                    Some(r) => r.reduce(vectors, rp.target_dim, params.seed),
                    None => SpectralReducer::new()
                        .with_n_neighbors(rp.n_neighbors)
                        .with_metric(self.metric)
                        .with_max_iter(params.max_iter)
                        .with_deadline(params.deadline)
                        .reduce(vectors, rp.target_dim, params.seed),
                };
                match outcome {
                    Ok(reduced) => {
                        let status = ReductionStatus::Applied {
                            dim: rp.target_dim,
                            converged: reduced.converged,
                        };
                        let data = reduced.vectors.into_iter().map(|r| r.vector).collect();
                        (data, Metric::Euclidean, status, reduced.iterations)
                    }
                    Err(Error::InsufficientSamples { n_items, required }) => {
                        warn!(n_items, required, "too few samples to reduce, clustering original vectors");
                        (
                            raw(),
                            self.metric,
                            ReductionStatus::SkippedInsufficientSamples { n_items, required },
                            0,
                        )
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let fit = hdbscan.clone().with_metric(metric).fit(&data)?;
        debug!(n_clusters = fit.n_clusters, ?reduction, "density partition");

        let converged = match reduction {
            ReductionStatus::Applied { converged, .. } => converged,
            _ => true,
        };
        Ok(PartitionRun {
            partition: Partition::from_labels(ids, &fit.labels, fit.n_clusters, PartitionKind::Density),
            centroids: None,
            converged,
            iterations,
            inertia: None,
            reduction,
        })
    }
}
