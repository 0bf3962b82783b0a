//! Distance model shared by every clustering strategy.
//!
//! Embeddings from sentence encoders are compared by angle, so the default
//! metric is cosine distance:
//!
//! ```text
//! d(a, b) = 1 - (a · b) / (|a| |b|)        ∈ [0, 2]
//! ```
//!
//! Euclidean distance is used for projected (reduced) coordinates, where
//! magnitudes carry the neighborhood structure.

use crate::error::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Metric used to compare vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 - cos(a, b)`.
    #[default]
    Cosine,
    /// `||a - b||₂`.
    Euclidean,
}

impl Metric {
    /// Distance between two vectors of equal length.
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Metric::Cosine => {
                let mut dot = 0.0f32;
                let mut na = 0.0f32;
                let mut nb = 0.0f32;
                for (x, y) in a.iter().zip(b.iter()) {
                    dot += x * y;
                    na += x * x;
                    nb += y * y;
                }
                let denom = na.sqrt() * nb.sqrt();
                if denom <= f32::EPSILON {
                    // Undefined angle (e.g. a collapsed centroid).
                    return 1.0;
                }
                (1.0 - dot / denom).clamp(0.0, 2.0)
            }
            Metric::Euclidean => squared_euclidean(a, b).sqrt(),
        }
    }

    /// Check that `vector` lives in this metric space.
    pub fn validate(self, id: u64, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::InvalidMetric {
                id,
                reason: "vector has no components",
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidMetric {
                id,
                reason: "vector contains NaN or infinite components",
            });
        }
        if self == Metric::Cosine && vector.iter().all(|&x| x == 0.0) {
            return Err(Error::InvalidMetric {
                id,
                reason: "zero vector has no direction under cosine distance",
            });
        }
        Ok(())
    }
}

#[inline]
pub(crate) fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Dense `n × n` distance matrix.
pub fn pairwise_distances(metric: Metric, data: &[Vec<f32>]) -> Array2<f32> {
    let n = data.len();
    let row = |i: usize| -> Vec<f32> {
        (0..n)
            .map(|j| {
                if i == j {
                    0.0
                } else {
                    metric.distance(&data[i], &data[j])
                }
            })
            .collect()
    };

    #[cfg(feature = "parallel")]
    let rows: Vec<Vec<f32>> = (0..n).into_par_iter().map(row).collect();
    #[cfg(not(feature = "parallel"))]
    let rows: Vec<Vec<f32>> = (0..n).map(row).collect();

    Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_ignores_magnitude() {
        let a = [1.0, 0.0];
        let b = [5.0, 0.0];
        assert!(Metric::Cosine.distance(&a, &b).abs() < 1e-6);
        let c = [0.0, 2.0];
        assert!((Metric::Cosine.distance(&a, &c) - 1.0).abs() < 1e-6);
        let d = [-3.0, 0.0];
        assert!((Metric::Cosine.distance(&a, &d) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn euclidean_matches_pythagoras() {
        assert!((Metric::Euclidean.distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn validate_rejects_nan_and_zero() {
        assert!(matches!(
            Metric::Euclidean.validate(7, &[1.0, f32::NAN]),
            Err(Error::InvalidMetric { id: 7, .. })
        ));
        assert!(Metric::Cosine.validate(1, &[0.0, 0.0]).is_err());
        assert!(Metric::Euclidean.validate(1, &[0.0, 0.0]).is_ok());
        assert!(Metric::Cosine.validate(1, &[]).is_err());
    }

    #[test]
    fn pairwise_is_symmetric_with_zero_diagonal() {
        let data = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        let d = pairwise_distances(Metric::Cosine, &data);
        for i in 0..3 {
            assert_eq!(d[[i, i]], 0.0);
            for j in 0..3 {
                assert_eq!(d[[i, j]], d[[j, i]]);
            }
        }
    }

    #[test]
    fn pairwise_entries_match_direct_distances() {
        let data = vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![6.0, 8.0], vec![0.0, 1.0]];
        let d = pairwise_distances(Metric::Euclidean, &data);
        assert_eq!(d.dim(), (4, 4));
        assert!((d[[0, 1]] - 5.0).abs() < 1e-6);
        assert!((d[[0, 2]] - 10.0).abs() < 1e-6);
        assert!((d[[2, 3]] - Metric::Euclidean.distance(&data[2], &data[3])).abs() < 1e-6);
        assert_eq!(pairwise_distances(Metric::Euclidean, &[]).dim(), (0, 0));
    }
}
