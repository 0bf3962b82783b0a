use motif::cluster::{Clustering, Kmeans};
use motif::{
    ClusterSummaryBuilder, Metric, Mode, PartitionEngine, PartitionParams, ResponseVector, VectorStore,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn responses(data: &[Vec<f32>]) -> Vec<ResponseVector> {
    data.iter()
        .enumerate()
        .map(|(i, v)| ResponseVector {
            id: 1000 + i as u64,
            text: format!("response {i}"),
            vector: v.clone(),
        })
        .collect()
}

fn store(data: &[Vec<f32>]) -> VectorStore {
    let mut s = VectorStore::new();
    s.add_batch(responses(data)).unwrap();
    s
}

proptest! {
    #[test]
    fn prop_kmeans_labels_are_contiguous(
        data in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 2), 2..20),
        k in 2usize..5
    ) {
        if k <= Kmeans::max_k(data.len()) {
            let labels = Kmeans::new(k)
                .with_metric(Metric::Euclidean)
                .with_seed(42)
                .fit_predict(&data)
                .unwrap();

            prop_assert_eq!(labels.len(), data.len());
            let used: BTreeSet<usize> = labels.iter().copied().collect();
            prop_assert_eq!(used, (0..k).collect::<BTreeSet<_>>());
        }
    }

    #[test]
    fn prop_kmeans_is_deterministic(
        data in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 3), 3..16),
        seed in 0u64..1000
    ) {
        let model = Kmeans::new(2).with_metric(Metric::Euclidean).with_seed(seed);
        prop_assert_eq!(model.fit(&data).unwrap(), model.fit(&data).unwrap());
    }

    #[test]
    fn prop_density_partition_covers_input(
        data in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 2), 1..25),
        min_cluster_size in 2usize..5
    ) {
        let vectors = responses(&data);
        let run = PartitionEngine::new(Metric::Euclidean)
            .partition(&vectors, &Mode::density(min_cluster_size), &PartitionParams::default())
            .unwrap();

        prop_assert_eq!(run.partition.len(), vectors.len());
        for v in &vectors {
            prop_assert!(run.partition.get(v.id).is_some());
        }
        for c in 0..run.partition.n_clusters() {
            prop_assert!(run.partition.members(c).len() >= min_cluster_size);
        }
        prop_assert_eq!(run.partition.is_all_noise(), run.partition.n_clusters() == 0);
    }

    #[test]
    fn prop_record_sizes_sum_to_input(
        data in prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 2), 2..20),
        density in any::<bool>()
    ) {
        let s = store(&data);
        let mode = if density { Mode::density(3) } else { Mode::Centroid { k: 2 } };
        let run = PartitionEngine::new(Metric::Euclidean)
            .partition(s.get_all(), &mode, &PartitionParams::default())
            .unwrap();
        let records = ClusterSummaryBuilder::new(Metric::Euclidean)
            .with_max_representatives(2)
            .build(&run.partition, &s)
            .unwrap();

        prop_assert_eq!(records.iter().map(|r| r.size).sum::<usize>(), data.len());
        for r in &records {
            prop_assert!(r.representative_ids.len() <= 2);
            prop_assert!(r.representative_ids.iter().all(|id| r.member_ids.contains(id)));
        }
        for pair in records.windows(2) {
            prop_assert!(
                pair[0].size > pair[1].size
                    || (pair[0].size == pair[1].size && pair[0].cluster_id < pair[1].cluster_id)
            );
        }
    }
}
