//! K-means clustering.
//!
//! Partitions data into k clusters by minimizing **within-cluster sum of squares**
//! (WCSS) under the configured [`Metric`].
//!
//! # Lloyd's Algorithm
//!
//! 1. Initialize k centroids via k-means++
//! 2. **Assign**: Each point → nearest centroid (ties → lowest cluster id)
//! 3. **Update**: Each centroid → mean of assigned points
//! 4. Repeat until assignments stop changing or `max_iter` is reached
//!
//! With cosine distance the mean is still used as the center; only the
//! direction of the centroid matters for assignment.
//!
//! # Empty Clusters
//!
//! A cluster that loses all its points is reseeded with the point lying
//! farthest from its own centroid (taken from a cluster that can spare it),
//! so every fit returns exactly k non-empty clusters.
//!
//! ## K-means++ Initialization
//!
//! 1. Choose first centroid uniformly at random
//! 2. Choose next centroid with probability proportional to D(x)²
//!    (squared distance to nearest existing centroid)
//!
//! All randomness flows from a seeded `StdRng`, so identical input, seed and
//! k always give identical labels.

use super::traits::Clustering;
use super::util;
use crate::distance::Metric;
use crate::error::{Error, Result};
use ndarray::Array2;
use rand::prelude::*;
use std::time::Instant;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// K-means clustering algorithm.
#[derive(Debug, Clone)]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum Lloyd iterations per restart.
    max_iter: usize,
    /// Number of seeded restarts; the lowest inertia wins.
    n_init: usize,
    /// Random seed.
    seed: u64,
    /// Distance used for assignment.
    metric: Metric,
    /// Wall-clock cap; iteration stops early once it passes.
    deadline: Option<Instant>,
}

/// Result of a k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansFit {
    /// Cluster label per point, contiguous in `0..k`.
    pub labels: Vec<usize>,
    /// Final centroids, indexed by label.
    pub centroids: Vec<Vec<f32>>,
    /// Sum of squared distances from points to their centroid.
    pub inertia: f64,
    /// Lloyd iterations run for the chosen restart.
    pub iterations: usize,
    /// Whether assignments stabilized before the iteration/time cap.
    pub converged: bool,
}

impl Kmeans {
    /// Create a new K-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 300,
            n_init: 4,
            seed: 42,
            metric: Metric::Cosine,
            deadline: None,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of seeded restarts (at least 1).
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Stop iterating once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Largest K accepted for `n_items` points: `N - 1`, except that two
    /// points may form two singletons.
    pub fn max_k(n_items: usize) -> usize {
        n_items.saturating_sub(1).max(2).min(n_items)
    }

    /// Fit and return labels, centroids and convergence information.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<KmeansFit> {
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        let n = data.len();
        if self.k < 2 || self.k > Self::max_k(n) {
            return Err(Error::InvalidK {
                requested: self.k,
                n_items: n,
            });
        }
        let d = util::check_dimensions(data)?;
        for (i, point) in data.iter().enumerate() {
            self.metric.validate(i as u64, point)?;
        }

        // Convert to ndarray
        let mut flat: Vec<f32> = Vec::with_capacity(n * d);
        for point in data {
            flat.extend_from_slice(point);
        }
        let data_arr = Array2::from_shape_vec((n, d), flat).map_err(|_| Error::DimensionMismatch {
            expected: n * d,
            found: data.iter().map(Vec::len).sum(),
        })?;

        let mut best: Option<KmeansFit> = None;
        for t in 0..self.n_init as u64 {
            let fit = self.fit_single(data, &data_arr, self.seed.wrapping_add(t));
            debug!(k = self.k, restart = t, inertia = fit.inertia, converged = fit.converged, "k-means restart");
            // Strict comparison keeps the earliest restart on ties.
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
            if self.deadline_passed() {
                break;
            }
        }

        let mut fit = best.ok_or(Error::EmptyInput)?;
        let mapping = util::relabel_by_first_appearance(&mut fit.labels, usize::MAX);
        let mut centroids = vec![Vec::new(); self.k];
        for (old, new) in mapping {
            centroids[new] = std::mem::take(&mut fit.centroids[old]);
        }
        fit.centroids = centroids;
        Ok(fit)
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn fit_single(&self, data: &[Vec<f32>], data_arr: &Array2<f32>, seed: u64) -> KmeansFit {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = self.init_centroids(data, &mut rng);
        let mut labels = self.assign(data, &centroids);
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.max_iter {
            iterations += 1;
            self.repair_empty(data, &mut centroids, &mut labels);
            centroids = self.update(data_arr, &labels);

            let next = self.assign(data, &centroids);
            if next == labels {
                converged = true;
                break;
            }
            labels = next;

            if self.deadline_passed() {
                break;
            }
        }

        if !converged {
            self.repair_empty(data, &mut centroids, &mut labels);
            centroids = self.update(data_arr, &labels);
        }

        let inertia = data
            .iter()
            .zip(labels.iter())
            .map(|(x, &l)| {
                let dist = self.metric.distance(x, &centroids[l]) as f64;
                dist * dist
            })
            .sum();

        KmeansFit {
            labels,
            centroids,
            inertia,
            iterations,
            converged,
        }
    }

    /// Initialize centroids using k-means++ algorithm.
    fn init_centroids(&self, data: &[Vec<f32>], rng: &mut impl Rng) -> Vec<Vec<f32>> {
        let n = data.len();
        let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(self.k);

        // First centroid: random point
        let first = rng.random_range(0..n);
        centroids.push(data[first].clone());

        // Remaining centroids: k-means++ selection
        for _ in 1..self.k {
            let distances: Vec<f32> = data
                .iter()
                .map(|point| {
                    centroids
                        .iter()
                        .map(|c| {
                            let d = self.metric.distance(point, c);
                            d * d
                        })
                        .fold(f32::MAX, f32::min)
                })
                .collect();

            // Sample proportional to squared distance
            let total: f32 = distances.iter().sum();
            if total <= 0.0 {
                let idx = rng.random_range(0..n);
                centroids.push(data[idx].clone());
                continue;
            }

            let threshold = rng.random::<f32>() * total;
            let mut cumsum = 0.0;
            let mut selected = distances.iter().rposition(|&d| d > 0.0).unwrap_or(0);

            for (j, &d) in distances.iter().enumerate() {
                cumsum += d;
                if d > 0.0 && cumsum >= threshold {
                    selected = j;
                    break;
                }
            }

            centroids.push(data[selected].clone());
        }

        centroids
    }

    /// Nearest centroid per point; equidistant centroids resolve to the lowest id.
    fn assign(&self, data: &[Vec<f32>], centroids: &[Vec<f32>]) -> Vec<usize> {
        let nearest = |point: &Vec<f32>| -> usize {
            let mut best_cluster = 0;
            let mut best_dist = f32::INFINITY;
            for (k, c) in centroids.iter().enumerate() {
                let dist = self.metric.distance(point, c);
                if dist < best_dist {
                    best_dist = dist;
                    best_cluster = k;
                }
            }
            best_cluster
        };

        #[cfg(feature = "parallel")]
        {
            data.par_iter().map(nearest).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            data.iter().map(nearest).collect()
        }
    }

    /// Mean of the points assigned to each cluster.
    fn update(&self, data_arr: &Array2<f32>, labels: &[usize]) -> Vec<Vec<f32>> {
        let mut sums = Array2::<f32>::zeros((self.k, data_arr.ncols()));
        let mut counts = vec![0usize; self.k];

        for (i, &label) in labels.iter().enumerate() {
            let mut row = sums.row_mut(label);
            row += &data_arr.row(i);
            counts[label] += 1;
        }

        sums.outer_iter()
            .zip(counts.iter())
            .map(|(row, &count)| {
                let count = count.max(1) as f32;
                row.iter().map(|x| x / count).collect()
            })
            .collect()
    }

    /// Give every empty cluster the point farthest from its current centroid.
    fn repair_empty(&self, data: &[Vec<f32>], centroids: &mut [Vec<f32>], labels: &mut [usize]) {
        let mut counts = vec![0usize; self.k];
        for &l in labels.iter() {
            counts[l] += 1;
        }

        for empty in 0..self.k {
            if counts[empty] > 0 {
                continue;
            }

            let mut farthest: Option<(usize, f32)> = None;
            for (i, point) in data.iter().enumerate() {
                let l = labels[i];
                if counts[l] <= 1 {
                    continue;
                }
                let dist = self.metric.distance(point, &centroids[l]);
                if farthest.map_or(true, |(_, best)| dist > best) {
                    farthest = Some((i, dist));
                }
            }

            if let Some((i, _)) = farthest {
                debug!(cluster = empty, point = i, "reseeding empty k-means cluster");
                counts[labels[i]] -= 1;
                labels[i] = empty;
                counts[empty] = 1;
                centroids[empty] = data[i].clone();
            }
        }
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        self.fit(data).map(|fit| fit.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
        ]
    }

    #[test]
    fn test_kmeans_basic() {
        let kmeans = Kmeans::new(2).with_metric(Metric::Euclidean).with_seed(42);
        let labels = kmeans.fit_predict(&two_groups()).unwrap();

        // Points 0,1 should be in same cluster, points 2,3 in another
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
        // Canonical numbering: the first point's cluster is 0.
        assert_eq!(labels[0], 0);
    }

    #[test]
    fn test_kmeans_cosine_groups_by_direction() {
        let data = vec![
            vec![1.0, 0.05],
            vec![8.0, 0.2],
            vec![0.05, 1.0],
            vec![0.3, 9.0],
        ];
        let labels = Kmeans::new(2).with_seed(0).fit_predict(&data).unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_kmeans_all_points_assigned() {
        // Property: every point must be assigned to exactly one cluster
        let data: Vec<Vec<f32>> = (0..50)
            .map(|i| vec![i as f32 * 0.1, (i % 5) as f32])
            .collect();

        let kmeans = Kmeans::new(5).with_metric(Metric::Euclidean).with_seed(123);
        let fit = kmeans.fit(&data).unwrap();

        assert_eq!(fit.labels.len(), data.len());
        let mut seen = vec![false; 5];
        for &label in &fit.labels {
            assert!(label < 5, "label {} out of range", label);
            seen[label] = true;
        }
        assert!(seen.iter().all(|&s| s), "every cluster id in 0..k is used");
        assert_eq!(fit.centroids.len(), 5);
    }

    #[test]
    fn test_kmeans_k_equals_n_only_for_two_points() {
        let pair = vec![vec![0.0, 0.0], vec![1.0, 0.0]];
        let labels = Kmeans::new(2)
            .with_metric(Metric::Euclidean)
            .fit_predict(&pair)
            .unwrap();
        assert_eq!(labels, vec![0, 1]);

        let data = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(
            Kmeans::new(3).fit(&data).unwrap_err(),
            Error::InvalidK {
                requested: 3,
                n_items: 3
            }
        );
        assert_eq!(Kmeans::new(2).fit(&data).map(|f| f.labels.len()), Ok(3));
    }

    #[test]
    fn test_assign_ties_go_to_lowest_cluster() {
        let kmeans = Kmeans::new(2).with_metric(Metric::Euclidean);
        let midpoint = vec![vec![0.5, 0.0]];
        let left_right = vec![vec![0.0, 0.0], vec![1.0, 0.0]];
        let right_left = vec![vec![1.0, 0.0], vec![0.0, 0.0]];
        assert_eq!(kmeans.assign(&midpoint, &left_right), vec![0]);
        assert_eq!(kmeans.assign(&midpoint, &right_left), vec![0]);

        let three = vec![vec![0.0, 1.0], vec![0.0, -1.0], vec![1.0, 0.0]];
        assert_eq!(kmeans.assign(&[vec![0.0, 0.0]], &three), vec![0]);
    }

    #[test]
    fn test_max_k() {
        assert_eq!(Kmeans::max_k(1), 1);
        assert_eq!(Kmeans::max_k(2), 2);
        assert_eq!(Kmeans::max_k(3), 2);
        assert_eq!(Kmeans::max_k(12), 11);
    }

    #[test]
    fn test_kmeans_duplicates_still_fill_every_cluster() {
        // Three identical points force an empty cluster after seeding.
        let data = vec![vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]];
        let fit = Kmeans::new(2)
            .with_metric(Metric::Euclidean)
            .fit(&data)
            .unwrap();
        assert!(fit.labels.contains(&0));
        assert!(fit.labels.contains(&1));
    }

    #[test]
    fn test_kmeans_deterministic_with_seed() {
        let data: Vec<Vec<f32>> = (0..30)
            .map(|i| vec![(i * 7 % 11) as f32, (i * 3 % 5) as f32 + 1.0])
            .collect();

        let a = Kmeans::new(3).with_seed(7).fit(&data).unwrap();
        let b = Kmeans::new(3).with_seed(7).fit(&data).unwrap();
        assert_eq!(a, b, "same seed should give same result");
    }

    #[test]
    fn test_kmeans_iteration_cap_reports_not_converged() {
        let data: Vec<Vec<f32>> = (0..40)
            .map(|i| vec![(i % 7) as f32, (i % 3) as f32 + (i / 10) as f32])
            .collect();
        let fit = Kmeans::new(4)
            .with_metric(Metric::Euclidean)
            .with_max_iter(0)
            .fit(&data)
            .unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.labels.len(), 40);
    }

    #[test]
    fn test_kmeans_empty_input_error() {
        let data: Vec<Vec<f32>> = vec![];
        assert_eq!(Kmeans::new(2).fit(&data).unwrap_err(), Error::EmptyInput);
    }

    #[test]
    fn test_kmeans_invalid_k() {
        let data = vec![vec![0.0, 1.0], vec![1.0, 1.0]];
        assert!(matches!(
            Kmeans::new(5).fit(&data),
            Err(Error::InvalidK { requested: 5, n_items: 2 })
        ));
        assert!(matches!(
            Kmeans::new(1).fit(&data),
            Err(Error::InvalidK { requested: 1, .. })
        ));
    }
}
