//! HDBSCAN: Hierarchical Density-Based Spatial Clustering of Applications with Noise.
//!
//! HDBSCAN (Campello, Moulavi, Sander 2013) removes DBSCAN's global epsilon
//! and selects the most stable clusters from a density hierarchy.
//!
//! # Algorithm Outline
//!
//! 1. **Core distance**: distance from each point to its `min_samples`-th
//!    nearest neighbor. This estimates local density.
//!
//! 2. **Mutual reachability distance**:
//!    `mrd(i, j) = max(core[i], core[j], dist(i, j))`.
//!
//! 3. **MST** over mutual reachability (Prim, O(n²)), edges sorted ascending
//!    with ties broken by the lower point ids.
//!
//! 4. **Single-linkage tree** from the sorted MST edges.
//!
//! 5. **Condensed tree**: walk the single-linkage tree from the root. A split
//!    where both sides hold at least `min_cluster_size` points creates two
//!    child clusters; otherwise the smaller side's points "fall out" of the
//!    current cluster at `λ = 1 / distance`.
//!
//! 6. **Excess-of-mass selection**: `stability(c) = Σ (λ_p − λ_birth(c))`
//!    over the points and child clusters leaving `c`. Bottom-up, keep a cluster
//!    when its stability is at least the sum of its selected descendants.
//!
//! 7. Points that never reach a selected cluster are noise.
//!
//! 8. **Numbering**: replay the sorted MST edges and number selected clusters
//!    in the order the linkage first gathers `min_cluster_size` of their
//!    points into one component. Clusters completed by the same merge are
//!    ordered by their lowest point index.
//!
//! Zero selected clusters is a valid outcome: every point is then noise.
//!
//! # References
//!
//! Campello, R. J. G. B., Moulavi, D., Sander, J. (2013). "Density-Based Clustering
//! Based on Hierarchical Density Estimates." PAKDD 2013.

use super::traits::Clustering;
use super::util::{self, UnionFind};
use super::NOISE;
use crate::distance::{pairwise_distances, Metric};
use crate::error::{Error, Result};
use ndarray::Array2;
use std::collections::BTreeMap;

/// Smallest distance used when converting merge heights into λ = 1/d.
/// Exact duplicates would otherwise produce infinite λ.
const MIN_MERGE_DISTANCE: f64 = 1e-8;

/// HDBSCAN clustering algorithm.
#[derive(Debug, Clone)]
pub struct Hdbscan {
    min_cluster_size: usize,
    min_samples: Option<usize>,
    allow_single_cluster: bool,
    metric: Metric,
}

/// Result of a density fit.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityFit {
    /// `Some(cluster)` per point, `None` for noise. Cluster ids are contiguous
    /// and numbered in order of discovery during the linkage.
    pub labels: Vec<Option<usize>>,
    /// Number of clusters found (may be 0).
    pub n_clusters: usize,
}

impl Hdbscan {
    /// Create a new HDBSCAN clusterer.
    ///
    /// Defaults: `min_cluster_size = 3`, `min_samples = min_cluster_size`,
    /// no single-cluster result, Euclidean distance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `min_cluster_size` (minimum points for a cluster to persist).
    pub fn with_min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        self.min_cluster_size = min_cluster_size;
        self
    }

    /// Set `min_samples` (k for core distance computation).
    ///
    /// The core distance is the distance to the `min_samples`-th nearest
    /// *other* point; the point itself is not counted. `min_samples = k`
    /// here matches `min_samples = k + 1` in implementations that count it.
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = Some(min_samples);
        self
    }

    /// Allow the root of the hierarchy to be returned as one cluster.
    pub fn with_allow_single_cluster(mut self, allow: bool) -> Self {
        self.allow_single_cluster = allow;
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Fit and return labels with noise as `None`.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<DensityFit> {
        let n = data.len();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.min_cluster_size < 2 {
            return Err(Error::InvalidParameter {
                name: "min_cluster_size",
                message: "must be at least 2",
            });
        }
        if self.min_samples == Some(0) {
            return Err(Error::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1",
            });
        }
        util::check_dimensions(data)?;
        for (i, point) in data.iter().enumerate() {
            self.metric.validate(i as u64, point)?;
        }

        if n < self.min_cluster_size {
            return Ok(DensityFit {
                labels: vec![None; n],
                n_clusters: 0,
            });
        }

        let dists = pairwise_distances(self.metric, data);
        let min_samples = self.min_samples.unwrap_or(self.min_cluster_size);
        let core = core_distances(&dists, min_samples);

        let mst = util::prim_mst(n, |i, j| dists[[i, j]].max(core[i]).max(core[j]));
        let tree = SingleLinkage::from_mst(&mst, n);
        let condensed = CondensedTree::build(&tree, self.min_cluster_size);
        let mut labels = condensed.labels(self.allow_single_cluster);

        relabel_by_discovery(&mut labels, &mst, self.min_cluster_size);
        let n_clusters = labels
            .iter()
            .filter(|&&l| l != NOISE)
            .max()
            .map_or(0, |&m| m + 1);

        Ok(DensityFit {
            labels: labels
                .into_iter()
                .map(|l| if l == NOISE { None } else { Some(l) })
                .collect(),
            n_clusters,
        })
    }
}

impl Default for Hdbscan {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            min_samples: None,
            allow_single_cluster: false,
            metric: Metric::Euclidean,
        }
    }
}

impl Clustering for Hdbscan {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self
            .fit(data)?
            .labels
            .into_iter()
            .map(|l| l.unwrap_or(NOISE))
            .collect())
    }

    fn n_clusters(&self) -> usize {
        0
    }
}

/// Renumber selected clusters by the MST merge at which `min_cluster_size`
/// of their points first share a component. Ties go to the cluster holding
/// the lowest point index.
fn relabel_by_discovery(labels: &mut [usize], mst: &[(usize, usize, f32)], min_cluster_size: usize) {
    let n = labels.len();
    let mut first_point: BTreeMap<usize, usize> = BTreeMap::new();
    for (p, &l) in labels.iter().enumerate() {
        if l != NOISE {
            first_point.entry(l).or_insert(p);
        }
    }
    if first_point.is_empty() {
        return;
    }

    // Selected-cluster point counts per component root.
    let mut counts: Vec<BTreeMap<usize, usize>> = labels
        .iter()
        .map(|&l| if l == NOISE { BTreeMap::new() } else { BTreeMap::from([(l, 1)]) })
        .collect();
    let mut order: Vec<usize> = Vec::with_capacity(first_point.len());
    let mut uf = UnionFind::new(n);

    for &(u, v, _) in mst {
        let (ru, rv) = (uf.find(u), uf.find(v));
        if ru == rv {
            continue;
        }
        let a = std::mem::take(&mut counts[ru]);
        let b = std::mem::take(&mut counts[rv]);
        let (mut merged, small) = if a.len() >= b.len() { (a, b) } else { (b, a) };
        for (l, c) in small {
            *merged.entry(l).or_insert(0) += c;
        }

        let mut found: Vec<usize> = merged
            .iter()
            .filter(|&(l, &c)| c >= min_cluster_size && !order.contains(l))
            .map(|(&l, _)| l)
            .collect();
        found.sort_by_key(|l| first_point[l]);
        order.extend(found);

        let root = uf.union_roots(ru, rv);
        counts[root] = merged;
    }

    let mut rest: Vec<usize> = first_point
        .keys()
        .copied()
        .filter(|l| !order.contains(l))
        .collect();
    rest.sort_by_key(|l| first_point[l]);
    order.extend(rest);

    let mapping: BTreeMap<usize, usize> = order.iter().enumerate().map(|(new, &old)| (old, new)).collect();
    for l in labels.iter_mut() {
        if let Some(&new) = mapping.get(l) {
            *l = new;
        }
    }
}

fn core_distances(dists: &Array2<f32>, min_samples: usize) -> Vec<f32> {
    let n = dists.nrows();
    if n < 2 {
        return vec![0.0; n];
    }
    let k = min_samples.clamp(1, n - 1);
    dists
        .outer_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut others: Vec<f32> = row
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &d)| d)
                .collect();
            others.sort_by(|a, b| a.total_cmp(b));
            others[k - 1]
        })
        .collect()
}

/// Single-linkage dendrogram. Nodes `0..n` are points, node `n + m` is the
/// `m`-th merge.
struct SingleLinkage {
    n: usize,
    /// `(left, right, distance, size)` per merge.
    merges: Vec<(usize, usize, f32, usize)>,
}

impl SingleLinkage {
    fn from_mst(edges: &[(usize, usize, f32)], n: usize) -> Self {
        let mut uf = UnionFind::new(n);
        let mut comp_node: Vec<usize> = (0..n).collect();
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        for &(u, v, dist) in edges {
            let ru = uf.find(u);
            let rv = uf.find(v);
            if ru == rv {
                continue;
            }
            let left = comp_node[ru];
            let right = comp_node[rv];
            let size = uf.size[ru] + uf.size[rv];
            merges.push((left, right, dist, size));

            let root = uf.union_roots(ru, rv);
            comp_node[root] = n + merges.len() - 1;
        }

        Self { n, merges }
    }

    fn size(&self, node: usize) -> usize {
        if node < self.n {
            1
        } else {
            self.merges[node - self.n].3
        }
    }

    fn root(&self) -> Option<usize> {
        if self.merges.is_empty() {
            None
        } else {
            Some(self.n + self.merges.len() - 1)
        }
    }

    fn leaves(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.size(node));
        let mut stack = vec![node];
        while let Some(t) = stack.pop() {
            if t < self.n {
                out.push(t);
            } else {
                let (l, r, _, _) = self.merges[t - self.n];
                stack.push(r);
                stack.push(l);
            }
        }
        out
    }
}

/// Condensed cluster tree. Cluster 0 is the root; children always have
/// larger ids than their parent.
struct CondensedTree {
    n: usize,
    /// Parent cluster per cluster (`None` for the root).
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    stability: Vec<f64>,
    /// Cluster each point fell out of.
    point_cluster: Vec<usize>,
}

impl CondensedTree {
    fn build(tree: &SingleLinkage, min_cluster_size: usize) -> Self {
        let n = tree.n;
        let mut parent: Vec<Option<usize>> = vec![None];
        let mut children: Vec<Vec<usize>> = vec![Vec::new()];
        let mut birth: Vec<f64> = vec![0.0];
        let mut stability: Vec<f64> = vec![0.0];
        let mut point_cluster = vec![0usize; n];

        let Some(root) = tree.root() else {
            return Self {
                n,
                parent,
                children,
                stability,
                point_cluster,
            };
        };

        let mut stack = vec![(root, 0usize)];
        while let Some((node, cluster)) = stack.pop() {
            let (left, right, dist, _) = tree.merges[node - n];
            let lambda = 1.0 / (dist as f64).max(MIN_MERGE_DISTANCE);
            let (ls, rs) = (tree.size(left), tree.size(right));
            let grow = lambda - birth[cluster];

            match (ls >= min_cluster_size, rs >= min_cluster_size) {
                (true, true) => {
                    for (child, size) in [(left, ls), (right, rs)] {
                        let id = parent.len();
                        parent.push(Some(cluster));
                        children.push(Vec::new());
                        birth.push(lambda);
                        stability.push(0.0);
                        children[cluster].push(id);
                        stability[cluster] += grow * size as f64;
                        stack.push((child, id));
                    }
                }
                (true, false) | (false, true) => {
                    let (big, small, small_size) = if ls >= min_cluster_size {
                        (left, right, rs)
                    } else {
                        (right, left, ls)
                    };
                    for p in tree.leaves(small) {
                        point_cluster[p] = cluster;
                    }
                    stability[cluster] += grow * small_size as f64;
                    stack.push((big, cluster));
                }
                (false, false) => {
                    for side in [left, right] {
                        for p in tree.leaves(side) {
                            point_cluster[p] = cluster;
                        }
                    }
                    stability[cluster] += grow * (ls + rs) as f64;
                }
            }
        }

        Self {
            n,
            parent,
            children,
            stability,
            point_cluster,
        }
    }

    /// Labels per point using original cluster ids, `NOISE` for noise.
    fn labels(&self, allow_single_cluster: bool) -> Vec<usize> {
        let n_clusters = self.parent.len();
        let mut selected = vec![false; n_clusters];
        let mut subtree = self.stability.clone();

        for c in (0..n_clusters).rev() {
            if c == 0 && !allow_single_cluster {
                break;
            }
            if self.children[c].is_empty() {
                selected[c] = true;
                continue;
            }
            let child_sum: f64 = self.children[c].iter().map(|&ch| subtree[ch]).sum();
            if self.stability[c] >= child_sum {
                selected[c] = true;
                self.deselect_descendants(c, &mut selected);
            } else {
                subtree[c] = child_sum;
            }
        }

        (0..self.n)
            .map(|p| {
                let mut c = Some(self.point_cluster[p]);
                while let Some(cluster) = c {
                    if selected[cluster] {
                        return cluster;
                    }
                    c = self.parent[cluster];
                }
                NOISE
            })
            .collect()
    }

    fn deselect_descendants(&self, node: usize, selected: &mut [bool]) {
        let mut stack = self.children[node].clone();
        while let Some(c) = stack.pop() {
            selected[c] = false;
            stack.extend_from_slice(&self.children[c]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cluster(center: &[f32], n: usize, spread: f32) -> Vec<Vec<f32>> {
        let dim = center.len();
        let mut points = Vec::with_capacity(n);
        for i in 0..n {
            let mut p = Vec::with_capacity(dim);
            for (d, &c) in center.iter().enumerate() {
                let offset = spread * ((i * 7 + d * 13) % 11) as f32 / 11.0 - spread / 2.0;
                p.push(c + offset);
            }
            points.push(p);
        }
        points
    }

    #[test]
    fn two_well_separated_clusters() {
        let mut data = make_cluster(&[0.0, 0.0], 20, 0.5);
        data.extend(make_cluster(&[20.0, 20.0], 20, 0.5));

        let fit = Hdbscan::new()
            .with_min_samples(3)
            .with_min_cluster_size(10)
            .fit(&data)
            .unwrap();

        assert_eq!(fit.labels.len(), 40);
        assert_eq!(fit.n_clusters, 2);

        let (a, b) = (fit.labels[0], fit.labels[20]);
        assert!(a.is_some() && b.is_some() && a != b);
        assert!(fit.labels[..20].iter().all(|&l| l == a));
        assert!(fit.labels[20..].iter().all(|&l| l == b));
    }

    #[test]
    fn denser_group_is_discovered_first() {
        // Sparse group first in the input, tight group second.
        let mut data: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32, 0.0]).collect();
        data.extend((0..5).map(|i| vec![100.0 + 0.01 * i as f32, 0.0]));

        let fit = Hdbscan::new().with_min_cluster_size(3).fit(&data).unwrap();
        assert_eq!(fit.n_clusters, 2);
        assert!(fit.labels[..5].iter().all(|&l| l == Some(1)));
        assert!(fit.labels[5..].iter().all(|&l| l == Some(0)));
    }

    #[test]
    fn equal_merge_heights_resolve_by_lowest_index() {
        // Two interleaved groups of duplicates: every in-group edge has
        // weight 0, so only point indices order the merges.
        let data: Vec<Vec<f32>> = (0..12)
            .map(|i| if i % 2 == 0 { vec![1.0, 1.0] } else { vec![9.0, 9.0] })
            .collect();

        let fit = Hdbscan::new().with_min_cluster_size(3).fit(&data).unwrap();
        assert_eq!(fit.n_clusters, 2);
        for (i, &l) in fit.labels.iter().enumerate() {
            assert_eq!(l, Some(i % 2), "point {i}");
        }
    }

    #[test]
    fn core_distance_skips_the_point_itself() {
        let d = pairwise_distances(Metric::Euclidean, &[vec![0.0], vec![1.0], vec![3.0]]);
        assert_eq!(core_distances(&d, 1), vec![1.0, 1.0, 2.0]);
        assert_eq!(core_distances(&d, 2), vec![3.0, 2.0, 3.0]);
    }

    #[test]
    fn distant_outlier_is_noise() {
        let mut data = make_cluster(&[0.0, 0.0], 15, 0.3);
        data.extend(make_cluster(&[20.0, 20.0], 15, 0.3));
        data.push(vec![100.0, -100.0]);

        let fit = Hdbscan::new()
            .with_min_samples(3)
            .with_min_cluster_size(5)
            .fit(&data)
            .unwrap();

        assert!(fit.n_clusters >= 2, "should find at least 2 clusters");
        assert_eq!(fit.labels[30], None);
    }

    #[test]
    fn dispersed_points_are_all_noise() {
        // Too few points for two clusters of 3 to split off the root.
        let data = vec![
            vec![0.0, 0.0],
            vec![10.0, 10.0],
            vec![20.0, 0.0],
            vec![30.0, 10.0],
            vec![40.0, 0.0],
        ];

        let fit = Hdbscan::new().with_min_cluster_size(3).fit(&data).unwrap();
        assert_eq!(fit.n_clusters, 0);
        assert!(fit.labels.iter().all(Option::is_none));
    }

    #[test]
    fn fewer_points_than_min_cluster_size() {
        let data = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let fit = Hdbscan::new().with_min_cluster_size(3).fit(&data).unwrap();
        assert_eq!(fit.labels, vec![None, None]);
    }

    #[test]
    fn single_cluster_when_allowed() {
        let data = make_cluster(&[0.0, 0.0], 12, 0.5);

        let fit = Hdbscan::new()
            .with_min_cluster_size(12)
            .with_allow_single_cluster(true)
            .fit(&data)
            .unwrap();
        assert_eq!(fit.n_clusters, 1);
        assert!(fit.labels.iter().all(|&l| l == Some(0)));

        let fit = Hdbscan::new().with_min_cluster_size(12).fit(&data).unwrap();
        assert_eq!(fit.n_clusters, 0);
    }

    #[test]
    fn exact_duplicates_do_not_break_stability() {
        let mut data = vec![vec![1.0, 1.0]; 6];
        data.extend(vec![vec![9.0, 9.0]; 6]);
        let fit = Hdbscan::new().with_min_cluster_size(3).fit(&data).unwrap();
        assert_eq!(fit.n_clusters, 2);
        assert!(fit.labels[..6].iter().all(|&l| l == Some(0)));
        assert!(fit.labels[6..].iter().all(|&l| l == Some(1)));
    }

    #[test]
    fn property_non_noise_labels_meet_min_cluster_size() {
        let mut data = make_cluster(&[0.0, 0.0], 25, 0.5);
        data.extend(make_cluster(&[30.0, 30.0], 25, 0.5));
        data.push(vec![15.0, 15.0]);

        let min_cluster_size = 5;
        let fit = Hdbscan::new()
            .with_min_samples(3)
            .with_min_cluster_size(min_cluster_size)
            .fit(&data)
            .unwrap();

        let mut counts = std::collections::HashMap::new();
        for l in fit.labels.iter().flatten() {
            *counts.entry(*l).or_insert(0usize) += 1;
        }

        for (&label, &count) in &counts {
            assert!(
                count >= min_cluster_size,
                "label {label} has {count} points, expected at least {min_cluster_size}"
            );
        }
    }

    #[test]
    fn invalid_parameters() {
        let data = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        assert!(Hdbscan::new().with_min_cluster_size(1).fit(&data).is_err());
        assert!(Hdbscan::new().with_min_samples(0).fit(&data).is_err());
        assert_eq!(Hdbscan::new().fit(&[]).unwrap_err(), Error::EmptyInput);
        assert!(matches!(
            Hdbscan::new().fit(&[vec![0.0, 0.0], vec![1.0]]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn fit_predict_marks_noise() {
        let data = vec![vec![0.0, 0.0], vec![50.0, 50.0], vec![100.0, 0.0]];
        let labels = Hdbscan::new().fit_predict(&data).unwrap();
        assert!(labels.iter().all(|&l| l == NOISE));
    }
}
