//! Analysis configuration.
//!
//! Every field has a default, so a partial JSON document such as
//! `{"method": "kmeans", "n_clusters": 4}` is a complete configuration.

use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::partition::{Mode, PartitionParams, ReduceParams};
use crate::store::hex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// Clustering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Fixed-K k-means.
    #[serde(alias = "centroid")]
    Kmeans,
    /// HDBSCAN, optionally after dimensionality reduction.
    #[default]
    #[serde(alias = "umap_hdbscan", alias = "hdbscan")]
    Density,
}

/// Requested number of clusters for k-means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawClusterCount", into = "RawClusterCount")]
pub enum ClusterCount {
    /// Search for the best K.
    #[default]
    Auto,
    /// Use exactly this K.
    Fixed(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawClusterCount {
    Count(usize),
    Word(String),
    Missing,
}

impl TryFrom<RawClusterCount> for ClusterCount {
    type Error = String;

    fn try_from(raw: RawClusterCount) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawClusterCount::Count(k) => Ok(Self::Fixed(k)),
            RawClusterCount::Word(w) if w.eq_ignore_ascii_case("auto") => Ok(Self::Auto),
            RawClusterCount::Word(w) => Err(format!("expected an integer or \"auto\", got {w:?}")),
            RawClusterCount::Missing => Ok(Self::Auto),
        }
    }
}

impl From<ClusterCount> for RawClusterCount {
    fn from(c: ClusterCount) -> Self {
        match c {
            ClusterCount::Auto => Self::Word("auto".to_string()),
            ClusterCount::Fixed(k) => Self::Count(k),
        }
    }
}

/// Settings for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Clustering strategy.
    pub method: Method,
    /// K for k-means, or `auto`.
    pub n_clusters: ClusterCount,
    /// Lower bound of the auto-K search.
    pub k_min: Option<usize>,
    /// Upper bound of the auto-K search.
    pub k_max: Option<usize>,
    /// Smallest density cluster.
    pub min_cluster_size: usize,
    /// Core-distance neighbor count, excluding the point itself; defaults to
    /// `min_cluster_size`.
    pub min_samples: Option<usize>,
    /// Let density mode return one cluster spanning everything.
    pub allow_single_cluster: bool,
    /// Reduce dimensionality before density clustering.
    pub reduce_dim: bool,
    /// Reduced dimension.
    pub target_dim: usize,
    /// Neighbors per point in the reduction graph.
    pub n_neighbors: usize,
    /// Distance on the original embeddings.
    pub metric: Metric,
    /// Seed for every stochastic step.
    pub seed: u64,
    /// Iteration cap for k-means and the reducer.
    pub max_iter: usize,
    /// k-means restarts.
    pub n_init: usize,
    /// Representatives per cluster record.
    pub max_representatives: usize,
    /// Keywords per cluster record.
    pub max_keywords: usize,
    /// Wall-clock budget for iterative steps, in milliseconds.
    pub time_budget_ms: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            n_clusters: ClusterCount::Auto,
            k_min: None,
            k_max: None,
            min_cluster_size: 3,
            min_samples: None,
            allow_single_cluster: false,
            reduce_dim: true,
            target_dim: 5,
            n_neighbors: 15,
            metric: Metric::Cosine,
            seed: 42,
            max_iter: 300,
            n_init: 4,
            max_representatives: 3,
            max_keywords: 10,
            time_budget_ms: None,
        }
    }
}

impl AnalysisConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> Result<()> {
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
        if self.reduce_dim && self.target_dim == 0 {
            return Err(Error::InvalidParameter {
                name: "target_dim",
                message: "must be at least 1",
            });
        }
        if self.n_neighbors == 0 {
            return Err(Error::InvalidParameter {
                name: "n_neighbors",
                message: "must be at least 1",
            });
        }
        if self.n_init == 0 {
            return Err(Error::InvalidParameter {
                name: "n_init",
                message: "must be at least 1",
            });
        }
        Ok(())
    }

    /// SHA-256 over the canonical JSON form, hex encoded.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self).map_err(|e| Error::Config(e.to_string()))?;
        Ok(hex(&Sha256::digest(&bytes)))
    }

    /// Density mode parameters.
    pub fn density_mode(&self) -> Mode {
        Mode::Density {
            min_cluster_size: self.min_cluster_size,
            min_samples: self.min_samples,
            allow_single_cluster: self.allow_single_cluster,
        }
    }

    /// Engine parameters, with the deadline measured from `start`.
    pub fn partition_params(&self, start: Instant) -> PartitionParams {
        PartitionParams {
            seed: self.seed,
            max_iter: self.max_iter,
            n_init: self.n_init,
            deadline: self.time_budget_ms.map(|ms| start + Duration::from_millis(ms)),
            reduce: self.reduce_dim.then_some(ReduceParams {
                target_dim: self.target_dim,
                n_neighbors: self.n_neighbors,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        assert_eq!(AnalysisConfig::from_json("{}").unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn method_aliases() {
        for (json, method) in [
            (r#"{"method":"kmeans"}"#, Method::Kmeans),
            (r#"{"method":"density"}"#, Method::Density),
            (r#"{"method":"umap_hdbscan"}"#, Method::Density),
            (r#"{"method":"hdbscan"}"#, Method::Density),
        ] {
            assert_eq!(AnalysisConfig::from_json(json).unwrap().method, method);
        }
        assert!(matches!(
            AnalysisConfig::from_json(r#"{"method":"spectral"}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn cluster_count_forms() {
        let fixed = AnalysisConfig::from_json(r#"{"n_clusters": 4}"#).unwrap();
        assert_eq!(fixed.n_clusters, ClusterCount::Fixed(4));
        let auto = AnalysisConfig::from_json(r#"{"n_clusters": "auto"}"#).unwrap();
        assert_eq!(auto.n_clusters, ClusterCount::Auto);
        let null = AnalysisConfig::from_json(r#"{"n_clusters": null}"#).unwrap();
        assert_eq!(null.n_clusters, ClusterCount::Auto);
        assert!(AnalysisConfig::from_json(r#"{"n_clusters": "many"}"#).is_err());
    }

    #[test]
    fn json_round_trip_keeps_fingerprint() {
        let config = AnalysisConfig {
            method: Method::Kmeans,
            n_clusters: ClusterCount::Fixed(3),
            seed: 7,
            ..AnalysisConfig::default()
        };
        let back = AnalysisConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.fingerprint().unwrap(), config.fingerprint().unwrap());
        assert_ne!(
            config.fingerprint().unwrap(),
            AnalysisConfig::default().fingerprint().unwrap()
        );
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(AnalysisConfig::from_json(r#"{"min_cluster_size": 1}"#).is_err());
        assert!(AnalysisConfig::from_json(r#"{"n_init": 0}"#).is_err());
        assert!(AnalysisConfig::from_json(r#"{"target_dim": 0}"#).is_err());
        assert!(AnalysisConfig::from_json(r#"{"target_dim": 0, "reduce_dim": false}"#).is_ok());
    }

    #[test]
    fn partition_params_follow_config() {
        let start = Instant::now();
        let config = AnalysisConfig {
            reduce_dim: false,
            time_budget_ms: Some(50),
            ..AnalysisConfig::default()
        };
        let params = config.partition_params(start);
        assert!(params.reduce.is_none());
        assert_eq!(params.deadline, Some(start + Duration::from_millis(50)));
        assert_eq!(params.seed, 42);
    }
}
