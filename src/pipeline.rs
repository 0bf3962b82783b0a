//! End-to-end analysis: store → partition → cluster records.

use crate::cache::{CacheKey, ResultCache};
use crate::config::{AnalysisConfig, ClusterCount, Method};
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::partition::{Mode, Partition, PartitionEngine, PartitionOutcome, ReductionStatus};
use crate::reduce::DimensionReducer;
use crate::select::{ClusterSelector, Selection};
use crate::store::VectorStore;
use crate::summarize::Summarizer;
use crate::summary::{ClusterRecord, ClusterSummaryBuilder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// How a result was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    /// Strategy used.
    pub method: Method,
    /// K search details when K was chosen automatically.
    pub selection: Option<Selection>,
    /// False if any iterative step stopped at its cap.
    pub converged: bool,
    /// Iterations of the capped step (k-means or reducer).
    pub iterations: usize,
    /// Reduction outcome.
    pub reduction: ReductionStatus,
    /// Reduction was requested but the original vectors were clustered.
    pub fallback_unreduced: bool,
    /// Clustered vs. all-noise.
    pub outcome: PartitionOutcome,
    /// Number of responses.
    pub n_items: usize,
    /// Seed used.
    pub seed: u64,
    /// Fingerprint of the responses.
    pub input_fingerprint: String,
    /// Fingerprint of the configuration.
    pub config_fingerprint: String,
}

/// Complete result bundle of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Assignment of every response.
    pub partition: Partition,
    /// Records ordered by descending size, then cluster id.
    pub clusters: Vec<ClusterRecord>,
    /// Run details.
    pub metadata: RunMetadata,
}

impl AnalysisResult {
    /// `Err(Timeout)` unless every iterative step converged.
    pub fn require_converged(&self) -> Result<&Self> {
        if self.metadata.converged {
            Ok(self)
        } else {
            Err(Error::Timeout {
                iterations: self.metadata.iterations,
            })
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Run `summarizer` over every record, passing representative texts.
    pub fn summarize<S>(&self, store: &VectorStore, summarizer: &impl Summarizer<S>) -> Vec<S> {
        self.clusters
            .iter()
            .map(|record| {
                let samples: Vec<&str> = record
                    .representative_ids
                    .iter()
                    .filter_map(|&id| store.get(id))
                    .map(|r| r.text.as_str())
                    .collect();
                summarizer.summarize(record, &samples)
            })
            .collect()
    }
}

/// Runs analyses under one configuration.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    config_fingerprint: String,
    engine: PartitionEngine,
    cache: Option<Arc<ResultCache<AnalysisResult>>>,
}

impl Analyzer {
    /// Validate `config` and build an analyzer.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let config_fingerprint = config.fingerprint()?;
        Ok(Self {
            engine: PartitionEngine::new(config.metric),
            config,
            config_fingerprint,
            cache: None,
        })
    }

    /// Share results through `cache`.
    pub fn with_cache(mut self, cache: Arc<ResultCache<AnalysisResult>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the default reducer. Cache keys do not cover the reducer, so
    /// do not share a cache between analyzers with different reducers.
    pub fn with_reducer(mut self, reducer: impl DimensionReducer + Send + Sync + 'static) -> Self {
        self.engine = self.engine.with_reducer(reducer);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze every response in `store`.
    pub fn analyze(&self, store: &VectorStore) -> Result<Arc<AnalysisResult>> {
        if store.is_empty() {
            return Err(Error::EmptyInput);
        }
        let input_fingerprint = store.fingerprint();
        match &self.cache {
            Some(cache) => {
                let key = CacheKey::new(input_fingerprint.clone(), self.config_fingerprint.clone());
                cache.get_or_try_insert_with(key, || self.run(store, input_fingerprint))
            }
            None => self.run(store, input_fingerprint).map(Arc::new),
        }
    }

    /// Embed `texts` (ids `0..N`), then analyze them.
    pub fn analyze_texts<E, S>(&self, texts: &[S], embedder: &E) -> Result<(VectorStore, Arc<AnalysisResult>)>
    where
        E: Embedder + ?Sized,
        S: AsRef<str>,
    {
        let store = VectorStore::from_texts(texts, embedder)?;
        let result = self.analyze(&store)?;
        Ok((store, result))
    }

    fn run(&self, store: &VectorStore, input_fingerprint: String) -> Result<AnalysisResult> {
        let start = Instant::now();
        let config = &self.config;
        let vectors = store.get_all();
        let params = config.partition_params(start);
        info!(n_items = vectors.len(), method = ?config.method, seed = config.seed, "starting analysis");

        let (selection, run) = match (config.method, config.n_clusters) {
            (Method::Kmeans, ClusterCount::Fixed(k)) => {
                (None, self.engine.partition(vectors, &Mode::Centroid { k }, &params)?)
            }
            (Method::Kmeans, ClusterCount::Auto) => {
                let (selection, run) = ClusterSelector::new(self.engine.clone(), params).select(
                    vectors,
                    config.k_min,
                    config.k_max,
                )?;
                (Some(selection), run)
            }
            (Method::Density, _) => (None, self.engine.partition(vectors, &config.density_mode(), &params)?),
        };

        let clusters = ClusterSummaryBuilder::new(config.metric)
            .with_max_representatives(config.max_representatives)
            .with_max_keywords(config.max_keywords)
            .build(&run.partition, store)?;

        if !run.converged {
            warn!(iterations = run.iterations, "returning best-effort result that did not converge");
        }
        let outcome = run.partition.outcome();
        info!(
            ?outcome,
            noise = run.partition.noise_ids().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "analysis complete"
        );

        Ok(AnalysisResult {
            metadata: RunMetadata {
                method: config.method,
                selection,
                converged: run.converged,
                iterations: run.iterations,
                reduction: run.reduction,
                fallback_unreduced: run.reduction.fell_back(),
                outcome,
                n_items: vectors.len(),
                seed: config.seed,
                input_fingerprint,
                config_fingerprint: self.config_fingerprint.clone(),
            },
            partition: run.partition,
            clusters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::from_fn;

    fn axis_embedder() -> impl Embedder {
        from_fn(|t: &str| {
            let mut v = vec![0.0f32; 4];
            v[t.len() % 4] = 1.0;
            v[(t.len() + 1) % 4] += 0.1;
            Ok(v)
        })
    }

    #[test]
    fn analyze_rejects_empty_store() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        assert_eq!(analyzer.analyze(&VectorStore::new()).unwrap_err(), Error::EmptyInput);
    }

    #[test]
    fn cache_returns_shared_result() {
        let cache = Arc::new(ResultCache::new());
        let config = AnalysisConfig {
            method: Method::Kmeans,
            n_clusters: ClusterCount::Fixed(2),
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(config).unwrap().with_cache(Arc::clone(&cache));
        let texts = ["aaaa", "aaaa", "bbbbb", "bbbbb"];
        let (store, first) = analyzer.analyze_texts(&texts, &axis_embedder()).unwrap();
        let second = analyzer.analyze(&store).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn require_converged_maps_to_timeout() {
        let config = AnalysisConfig {
            method: Method::Kmeans,
            n_clusters: ClusterCount::Fixed(2),
            max_iter: 0,
            ..AnalysisConfig::default()
        };
        let analyzer = Analyzer::new(config).unwrap();
        let (_, result) = analyzer
            .analyze_texts(&["aaaa", "bbbbb", "aaaa", "cccccc"], &axis_embedder())
            .unwrap();
        assert!(!result.metadata.converged);
        assert_eq!(result.require_converged().unwrap_err(), Error::Timeout { iterations: 0 });
        assert_eq!(result.partition.len(), 4);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = AnalysisConfig {
            min_cluster_size: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(Analyzer::new(config), Err(Error::InvalidParameter { .. })));
    }
}
