//! Clustering algorithms for grouping response embeddings.
//!
//! Two hard-clustering strategies sit behind the [`Clustering`] trait and are
//! driven by [`PartitionEngine`](crate::partition::PartitionEngine):
//!
//! ## Algorithms
//!
//! ### K-means (centroid mode)
//!
//! Assign each point to the nearest centroid, then update centroids to the
//! mean of their points. Repeat.
//!
//! **Objective**: Minimize within-cluster sum of squares:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} d(x, μ_k)²
//! ```
//!
//! **Assumptions**:
//! - Clusters are roughly spherical
//! - You know k in advance (or let [`ClusterSelector`](crate::select::ClusterSelector) pick it)
//!
//! Every point lands in exactly one of k clusters; there is no noise.
//!
//! ### HDBSCAN (density mode)
//!
//! Builds a hierarchy of density-connected components and keeps the most
//! stable ones. The number of clusters is discovered, and points in sparse
//! regions are reported as noise. "Everything is noise" is a legitimate
//! answer for dispersed input.
//!
//! ## Usage
//!
//! ```rust
//! use motif::cluster::{Clustering, Hdbscan, Kmeans};
//! use motif::Metric;
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//!
//! let labels = Kmeans::new(2)
//!     .with_metric(Metric::Euclidean)
//!     .fit_predict(&data)
//!     .unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! let fit = Hdbscan::new().with_min_cluster_size(2).fit(&data).unwrap();
//! assert_eq!(fit.labels.len(), data.len());
//! ```

mod hdbscan;
mod kmeans;
mod traits;
pub(crate) mod util;

pub use hdbscan::{DensityFit, Hdbscan};
pub use kmeans::{Kmeans, KmeansFit};
pub use traits::Clustering;

/// Label used for points that belong to no cluster.
pub const NOISE: usize = usize::MAX;
