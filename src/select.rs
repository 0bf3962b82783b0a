//! Automatic choice of K for centroid mode.
//!
//! Every candidate K is clustered independently and scored by mean silhouette
//! on a distance matrix computed once up front. The highest score wins; equal
//! scores go to the smaller K.
//!
//! Candidates run in parallel under the `parallel` feature. Results are
//! collected in K order before comparison, so the choice never depends on
//! completion order.

use crate::distance::pairwise_distances;
use crate::error::{Error, Result};
use crate::metrics::silhouette_score;
use crate::partition::{PartitionEngine, PartitionParams, PartitionRun};
use crate::store::ResponseVector;
use serde::Serialize;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Upper bound of the default search range.
pub const DEFAULT_MAX_K: usize = 10;

/// Outcome of a K search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    /// Chosen cluster count.
    pub best_k: usize,
    /// `(k, silhouette)` for every candidate, sorted by `k`.
    pub scores: Vec<(usize, f64)>,
}

/// Searches candidate K values for centroid mode.
#[derive(Debug, Clone, Default)]
pub struct ClusterSelector {
    engine: PartitionEngine,
    params: PartitionParams,
}

impl ClusterSelector {
    /// Create a selector running `engine` with `params` for each candidate.
    pub fn new(engine: PartitionEngine, params: PartitionParams) -> Self {
        Self { engine, params }
    }

    /// Pick the best K in `[k_min, k_max] ∩ [2, N-1]`.
    ///
    /// Bounds default to `2` and `min(10, N-1)`. Fails with
    /// [`Error::NoValidK`] when the range is empty.
    pub fn select_k(
        &self,
        vectors: &[ResponseVector],
        k_min: Option<usize>,
        k_max: Option<usize>,
    ) -> Result<Selection> {
        self.select(vectors, k_min, k_max).map(|(selection, _)| selection)
    }

    /// Like [`select_k`](Self::select_k), also returning the winning run.
    pub fn select(
        &self,
        vectors: &[ResponseVector],
        k_min: Option<usize>,
        k_max: Option<usize>,
    ) -> Result<(Selection, PartitionRun)> {
        self.engine.validate(vectors)?;
        let n = vectors.len();
        let (lo, hi) = candidate_range(n, k_min, k_max)?;

        let ids: Vec<u64> = vectors.iter().map(|v| v.id).collect();
        let data: Vec<Vec<f32>> = vectors.iter().map(|v| v.vector.clone()).collect();
        let dists = pairwise_distances(self.engine.metric(), &data);

        let evaluate = |k: usize| -> Result<(usize, f64, PartitionRun)> {
            let run = self.engine.centroid(ids.clone(), &data, k, &self.params)?;
            let labels: Vec<usize> = run.partition.labels().into_iter().flatten().collect();
            let score = silhouette_score(&dists, &labels);
            debug!(k, score, converged = run.converged, "scored candidate");
            Ok((k, score, run))
        };

        #[cfg(feature = "parallel")]
        let candidates: Vec<(usize, f64, PartitionRun)> =
            (lo..=hi).into_par_iter().map(evaluate).collect::<Result<_>>()?;
        #[cfg(not(feature = "parallel"))]
        let candidates: Vec<(usize, f64, PartitionRun)> = (lo..=hi).map(evaluate).collect::<Result<_>>()?;

        let scores: Vec<(usize, f64)> = candidates.iter().map(|(k, s, _)| (*k, *s)).collect();

        // Candidates are in K order; strict `>` keeps the smaller K on ties.
        let mut best: Option<(usize, f64, PartitionRun)> = None;
        for candidate in candidates {
            if best.as_ref().map_or(true, |b| candidate.1 > b.1) {
                best = Some(candidate);
            }
        }
        let (best_k, best_score, run) = best.ok_or(Error::NoValidK {
            n_items: n,
            k_min: lo,
            k_max: hi,
        })?;

        info!(best_k, score = best_score, candidates = scores.len(), "selected cluster count");
        Ok((Selection { best_k, scores }, run))
    }
}

/// Resolve the candidate range for `n` items.
pub fn candidate_range(n: usize, k_min: Option<usize>, k_max: Option<usize>) -> Result<(usize, usize)> {
    let cap = n.saturating_sub(1);
    let requested_lo = k_min.unwrap_or(2);
    let requested_hi = k_max.unwrap_or(DEFAULT_MAX_K.min(cap));
    let lo = requested_lo.max(2);
    let hi = requested_hi.min(cap);
    if lo > hi {
        return Err(Error::NoValidK {
            n_items: n,
            k_min: requested_lo,
            k_max: requested_hi,
        });
    }
    Ok((lo, hi))
}
