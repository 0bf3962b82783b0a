//! Clustering traits.

use crate::error::Result;

/// Trait for hard clustering algorithms.
pub trait Clustering {
    /// Fit the model to data and return cluster assignments.
    ///
    /// Returns a vector of cluster labels, one per input point. Algorithms
    /// that can leave points unclustered return [`NOISE`](super::NOISE) for them.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>>;

    /// Get the number of clusters.
    ///
    /// For algorithms that discover the number of clusters dynamically
    /// (density clustering), this returns 0.
    fn n_clusters(&self) -> usize;
}
