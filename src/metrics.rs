//! Clustering quality measures.
//!
//! # Silhouette
//!
//! For point `i` with mean intra-cluster distance `a(i)` and smallest mean
//! distance to another cluster `b(i)`:
//!
//! ```text
//! s(i) = (b(i) - a(i)) / max(a(i), b(i))
//! ```
//!
//! Singletons score 0. The overall score is the mean of `s(i)`.
//!
//! # Example
//!
//! ```rust
//! use motif::distance::{pairwise_distances, Metric};
//! use motif::metrics::silhouette_score;
//!
//! let data = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![9.0, 9.0], vec![9.0, 10.0]];
//! let dists = pairwise_distances(Metric::Euclidean, &data);
//! assert!(silhouette_score(&dists, &[0, 0, 1, 1]) > 0.8);
//! ```
//!
//! # References
//!
//! - Rousseeuw (1987). "Silhouettes: a graphical aid to the interpretation
//!   and validation of cluster analysis"

use ndarray::Array2;

/// Per-point silhouette values from a precomputed distance matrix.
///
/// `labels` must be contiguous ids `0..k`. Returns all zeros when fewer than
/// two clusters are present.
pub fn silhouette_samples(dists: &Array2<f32>, labels: &[usize]) -> Vec<f64> {
    let n = labels.len();
    debug_assert_eq!(dists.nrows(), n);
    let k = labels.iter().max().map_or(0, |&m| m + 1);
    if k < 2 {
        return vec![0.0; n];
    }

    let mut sizes = vec![0usize; k];
    for &l in labels {
        sizes[l] += 1;
    }

    (0..n)
        .map(|i| {
            let own = labels[i];
            if sizes[own] <= 1 {
                return 0.0;
            }

            let mut sums = vec![0.0f64; k];
            for (j, &l) in labels.iter().enumerate() {
                if j != i {
                    sums[l] += dists[[i, j]] as f64;
                }
            }

            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..k)
                .filter(|&c| c != own && sizes[c] > 0)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);
            if !b.is_finite() {
                return 0.0;
            }

            let denom = a.max(b);
            if denom <= 0.0 {
                0.0
            } else {
                (b - a) / denom
            }
        })
        .collect()
}

/// Mean silhouette over all points.
pub fn silhouette_score(dists: &Array2<f32>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let s = silhouette_samples(dists, labels);
    s.iter().sum::<f64>() / s.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{pairwise_distances, Metric};

    fn line(xs: &[f32]) -> Array2<f32> {
        let data: Vec<Vec<f32>> = xs.iter().map(|&x| vec![x]).collect();
        pairwise_distances(Metric::Euclidean, &data)
    }

    #[test]
    fn silhouette_separated() {
        let d = line(&[0.0, 1.0, 100.0, 101.0]);
        let s = silhouette_score(&d, &[0, 0, 1, 1]);
        assert!(s > 0.95, "{s}");
    }

    #[test]
    fn silhouette_wrong_split_is_negative() {
        let d = line(&[0.0, 1.0, 100.0, 101.0]);
        assert!(silhouette_score(&d, &[0, 1, 0, 1]) < 0.0);
    }

    #[test]
    fn silhouette_singletons_score_zero() {
        let d = line(&[0.0, 5.0]);
        assert_eq!(silhouette_samples(&d, &[0, 1]), vec![0.0, 0.0]);

        let d = line(&[0.0, 1.0, 50.0]);
        let s = silhouette_samples(&d, &[0, 0, 1]);
        assert_eq!(s[2], 0.0);
        assert!(s[0] > 0.9);
    }

    #[test]
    fn silhouette_single_cluster_is_zero() {
        let d = line(&[0.0, 1.0, 2.0]);
        assert_eq!(silhouette_score(&d, &[0, 0, 0]), 0.0);
    }
}
