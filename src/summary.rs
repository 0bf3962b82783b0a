//! Per-cluster records handed to the summarization step.

use crate::cluster::NOISE;
use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::keywords::KeywordExtractor;
use crate::partition::{Partition, PartitionKind};
use crate::store::{ResponseVector, VectorStore};
use serde::Serialize;
use std::collections::BTreeSet;

/// Reserved id of the noise pseudo-cluster.
pub const NOISE_CLUSTER_ID: usize = NOISE;

/// Descriptive record for one cluster (or the noise pseudo-cluster).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterRecord {
    /// Cluster id, or [`NOISE_CLUSTER_ID`].
    pub cluster_id: usize,
    /// Member response ids.
    pub member_ids: BTreeSet<u64>,
    /// `member_ids.len()`.
    pub size: usize,
    /// Up to R members closest to the cluster center, closest first.
    pub representative_ids: Vec<u64>,
    /// Distinguishing terms, best first.
    pub keywords: Vec<String>,
    /// Whether this is the noise pseudo-cluster.
    pub is_noise: bool,
    /// Downstream consumers should treat this record with caution.
    pub low_confidence: bool,
    /// Mean member distance to the center; `None` for noise.
    pub cohesion: Option<f64>,
}

/// Builds [`ClusterRecord`]s from a partition and its store.
#[derive(Debug, Clone)]
pub struct ClusterSummaryBuilder {
    metric: Metric,
    max_representatives: usize,
    max_keywords: usize,
    extractor: KeywordExtractor,
}

impl Default for ClusterSummaryBuilder {
    fn default() -> Self {
        Self::new(Metric::default())
    }
}

impl ClusterSummaryBuilder {
    /// Builder ranking members with `metric`.
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            max_representatives: 3,
            max_keywords: 10,
            extractor: KeywordExtractor::new(),
        }
    }

    /// Cap on representatives per record.
    pub fn with_max_representatives(mut self, n: usize) -> Self {
        self.max_representatives = n;
        self
    }

    /// Cap on keywords per record.
    pub fn with_max_keywords(mut self, n: usize) -> Self {
        self.max_keywords = n;
        self
    }

    /// Use a custom keyword extractor.
    pub fn with_extractor(mut self, extractor: KeywordExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// One record per cluster plus a noise record if any noise exists.
    ///
    /// Records are ordered by descending size, then ascending cluster id, so
    /// the noise record sorts after any cluster of equal size.
    pub fn build(&self, partition: &Partition, store: &VectorStore) -> Result<Vec<ClusterRecord>> {
        let members: Vec<Vec<&ResponseVector>> = (0..partition.n_clusters())
            .map(|c| lookup(store, &partition.members(c)))
            .collect::<Result<_>>()?;

        let texts: Vec<Vec<&str>> = members
            .iter()
            .map(|m| m.iter().map(|r| r.text.as_str()).collect())
            .collect();
        let keywords = self.extractor.extract(&texts, self.max_keywords);

        let mut records: Vec<ClusterRecord> = members
            .iter()
            .zip(keywords)
            .enumerate()
            .map(|(cluster_id, (m, keywords))| {
                let (representative_ids, cohesion) = match partition.kind() {
                    PartitionKind::Centroid => self.rank_by_centroid(m),
                    PartitionKind::Density => self.rank_by_medoid(m),
                };
                ClusterRecord {
                    cluster_id,
                    member_ids: m.iter().map(|r| r.id).collect(),
                    size: m.len(),
                    representative_ids,
                    keywords,
                    is_noise: false,
                    low_confidence: false,
                    cohesion: Some(cohesion),
                }
            })
            .collect();

        let noise = partition.noise_ids();
        if !noise.is_empty() {
            lookup(store, &noise)?;
            records.push(ClusterRecord {
                cluster_id: NOISE_CLUSTER_ID,
                size: noise.len(),
                representative_ids: noise.iter().copied().take(self.max_representatives).collect(),
                member_ids: noise.into_iter().collect(),
                keywords: Vec::new(),
                is_noise: true,
                low_confidence: true,
                cohesion: None,
            });
        }

        records.sort_by(|a, b| b.size.cmp(&a.size).then(a.cluster_id.cmp(&b.cluster_id)));
        Ok(records)
    }

    fn rank_by_centroid(&self, members: &[&ResponseVector]) -> (Vec<u64>, f64) {
        let dim = members.first().map_or(0, |r| r.vector.len());
        let mut center = vec![0.0f32; dim];
        for r in members {
            for (c, x) in center.iter_mut().zip(&r.vector) {
                *c += x;
            }
        }
        let count = members.len().max(1) as f32;
        center.iter_mut().for_each(|c| *c /= count);

        let dists: Vec<f32> = members
            .iter()
            .map(|r| self.metric.distance(&r.vector, &center))
            .collect();
        self.rank(members, &dists)
    }

    fn rank_by_medoid(&self, members: &[&ResponseVector]) -> (Vec<u64>, f64) {
        let m = members.len();
        let mut totals = vec![0.0f64; m];
        for i in 0..m {
            for j in (i + 1)..m {
                let d = self.metric.distance(&members[i].vector, &members[j].vector) as f64;
                totals[i] += d;
                totals[j] += d;
            }
        }
        let medoid = (0..m)
            .min_by(|&a, &b| {
                totals[a]
                    .total_cmp(&totals[b])
                    .then(members[a].id.cmp(&members[b].id))
            })
            .unwrap_or(0);

        let dists: Vec<f32> = members
            .iter()
            .map(|r| self.metric.distance(&r.vector, &members[medoid].vector))
            .collect();
        self.rank(members, &dists)
    }

    fn rank(&self, members: &[&ResponseVector], dists: &[f32]) -> (Vec<u64>, f64) {
        let mut order: Vec<usize> = (0..members.len()).collect();
        order.sort_by(|&a, &b| dists[a].total_cmp(&dists[b]).then(members[a].id.cmp(&members[b].id)));
        let reps = order
            .into_iter()
            .take(self.max_representatives)
            .map(|i| members[i].id)
            .collect();
        let cohesion = if dists.is_empty() {
            0.0
        } else {
            dists.iter().map(|&d| d as f64).sum::<f64>() / dists.len() as f64
        };
        (reps, cohesion)
    }
}

fn lookup<'a>(store: &'a VectorStore, ids: &[u64]) -> Result<Vec<&'a ResponseVector>> {
    ids.iter()
        .map(|&id| {
            store.get(id).ok_or(Error::InvalidParameter {
                name: "partition",
                message: "references an id missing from the store",
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(points: &[(&str, Vec<f32>)]) -> VectorStore {
        let mut s = VectorStore::new();
        for (i, (text, v)) in points.iter().enumerate() {
            s.add(i as u64, *text, v.clone()).unwrap();
        }
        s
    }

    #[test]
    fn centroid_records_are_ordered_and_bounded() {
        let s = store(&[
            ("great service", vec![1.0, 0.0]),
            ("awful wait", vec![0.0, 1.0]),
            ("great staff service", vec![0.9, 0.1]),
            ("long wait", vec![0.1, 0.9]),
            ("wait forever", vec![0.05, 1.0]),
        ]);
        let p = Partition::from_labels(
            s.get_all().iter().map(|r| r.id).collect(),
            &[Some(0), Some(1), Some(0), Some(1), Some(1)],
            2,
            PartitionKind::Centroid,
        );
        let records = ClusterSummaryBuilder::new(Metric::Cosine)
            .with_max_representatives(2)
            .with_max_keywords(2)
            .build(&p, &s)
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cluster_id, 1);
        assert_eq!(records[0].size, 3);
        assert_eq!(records[1].size, 2);
        assert_eq!(records[0].keywords[0], "wait");
        for r in &records {
            assert!(r.representative_ids.len() <= 2);
            assert!(r.representative_ids.iter().all(|id| r.member_ids.contains(id)));
            assert!(r.keywords.len() <= 2);
            assert!(!r.is_noise);
        }
        assert_eq!(records.iter().map(|r| r.size).sum::<usize>(), 5);
    }

    #[test]
    fn medoid_is_first_representative() {
        let s = store(&[
            ("a", vec![0.0, 0.0]),
            ("b", vec![1.0, 0.0]),
            ("c", vec![2.0, 0.0]),
            ("d", vec![10.0, 0.0]),
        ]);
        let p = Partition::from_labels(
            vec![0, 1, 2, 3],
            &[Some(0), Some(0), Some(0), None],
            1,
            PartitionKind::Density,
        );
        let records = ClusterSummaryBuilder::new(Metric::Euclidean).build(&p, &s).unwrap();
        assert_eq!(records[0].representative_ids, vec![1, 0, 2]);
        assert_eq!(records[0].cohesion, Some(2.0 / 3.0));
    }

    #[test]
    fn noise_record_is_flagged() {
        let s = store(&[
            ("x", vec![0.0, 1.0]),
            ("y", vec![1.0, 0.0]),
            ("z", vec![1.0, 1.0]),
        ]);
        let p = Partition::from_labels(vec![0, 1, 2], &[None, None, None], 0, PartitionKind::Density);
        let records = ClusterSummaryBuilder::default()
            .with_max_representatives(2)
            .build(&p, &s)
            .unwrap();
        assert_eq!(records.len(), 1);
        let noise = &records[0];
        assert_eq!(noise.cluster_id, NOISE_CLUSTER_ID);
        assert!(noise.is_noise && noise.low_confidence);
        assert_eq!(noise.representative_ids, vec![0, 1]);
        assert!(noise.keywords.is_empty());
        assert_eq!(noise.size, 3);
    }

    #[test]
    fn missing_ids_are_rejected() {
        let s = store(&[("x", vec![1.0])]);
        let p = Partition::from_labels(vec![0, 9], &[Some(0), Some(0)], 1, PartitionKind::Density);
        assert!(matches!(
            ClusterSummaryBuilder::default().build(&p, &s),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
