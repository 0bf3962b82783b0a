use motif::{
    AnalysisConfig, Analyzer, ClusterCount, HashingEmbedder, KeywordSummarizer, Method, NOISE_CLUSTER_ID,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=motif=debug shows per-candidate K scores and reducer progress.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("motif=info".parse()?),
        )
        .init();

    let responses = [
        "The checkout page keeps crashing on my phone",
        "App crashed twice during checkout",
        "Checkout crashes whenever I apply a coupon",
        "Support took a week to answer my email",
        "Nobody from support answered my ticket",
        "Waited days for a support reply",
        "Love the new dark mode design",
        "The redesign looks clean and modern",
        "Great new design, very easy to read",
        "Shipping was fast",
    ];

    // The hashing embedder stands in for a sentence encoder.
    let embedder = HashingEmbedder::default();

    for method in [Method::Kmeans, Method::Density] {
        let config = AnalysisConfig {
            method,
            n_clusters: ClusterCount::Auto,
            k_max: Some(5),
            min_cluster_size: 2,
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(config)?;
        let (store, result) = analyzer.analyze_texts(&responses, &embedder)?;

        println!("== {:?} ==", method);
        if let Some(selection) = &result.metadata.selection {
            println!("best k = {} (scores {:?})", selection.best_k, selection.scores);
        }
        println!(
            "outcome = {:?}, reduction = {:?}, converged = {}",
            result.metadata.outcome, result.metadata.reduction, result.metadata.converged
        );

        let summaries = result.summarize(&store, &KeywordSummarizer::new());
        for (record, line) in result.clusters.iter().zip(summaries) {
            let id = if record.cluster_id == NOISE_CLUSTER_ID {
                "noise".to_string()
            } else {
                record.cluster_id.to_string()
            };
            println!("  [{id}] {line}");
        }
    }

    Ok(())
}
