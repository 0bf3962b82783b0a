//! # motif
//!
//! Thematic clustering of free-text survey responses.
//!
//! Responses are embedded by an external model, partitioned into themes, and
//! described by representative responses and keywords for a downstream
//! summarizer:
//!
//! ```text
//! texts → Embedder → VectorStore → [SpectralReducer →] PartitionEngine → ClusterSummaryBuilder
//!                                                          ↑
//!                                              ClusterSelector (auto K)
//! ```
//!
//! Two strategies sit behind [`PartitionEngine`]: k-means with a fixed or
//! automatically selected K, and HDBSCAN, which discovers the number of
//! themes and reports outliers as noise. Every stochastic step is seeded, so
//! identical input, order and configuration give identical results.
//!
//! ```rust
//! use motif::{AnalysisConfig, Analyzer, ClusterCount, HashingEmbedder, Method};
//!
//! let config = AnalysisConfig {
//!     method: Method::Kmeans,
//!     n_clusters: ClusterCount::Fixed(2),
//!     ..AnalysisConfig::default()
//! };
//! let texts = ["great service", "great service", "awful wait times", "awful wait times"];
//! let (_store, result) = Analyzer::new(config)?.analyze_texts(&texts, &HashingEmbedder::default())?;
//! assert_eq!(result.clusters.len(), 2);
//! # Ok::<(), motif::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod cache;
pub mod cluster;
pub mod config;
pub mod distance;
pub mod embed;
/// Error types used across `motif`.
pub mod error;
pub mod keywords;
pub mod metrics;
pub mod partition;
pub mod pipeline;
pub mod reduce;
pub mod select;
pub mod store;
pub mod summarize;
pub mod summary;

pub use cache::{CacheKey, ResultCache};
pub use cluster::{Clustering, Hdbscan, Kmeans, NOISE};
pub use config::{AnalysisConfig, ClusterCount, Method};
pub use distance::Metric;
pub use embed::{Embedder, HashingEmbedder};
pub use error::{Error, Result};
pub use keywords::KeywordExtractor;
pub use metrics::silhouette_score;
pub use partition::{
    ClusterAssignment, Mode, Partition, PartitionEngine, PartitionOutcome, PartitionParams,
    PartitionRun, ReduceParams, ReductionStatus,
};
pub use pipeline::{AnalysisResult, Analyzer, RunMetadata};
pub use reduce::{DimensionReducer, ReducedVector, Reduction, SpectralReducer};
pub use select::{ClusterSelector, Selection};
pub use store::{ResponseVector, VectorStore};
pub use summarize::{KeywordSummarizer, Summarizer};
pub use summary::{ClusterRecord, ClusterSummaryBuilder, NOISE_CLUSTER_ID};
