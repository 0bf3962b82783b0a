use thiserror::Error;

/// Result alias for `motif`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering engine and its collaborators.
///
/// Structural errors (`EmptyInput`, `DimensionMismatch`, `DuplicateId`,
/// `InvalidK`, `InvalidMetric`) abort the current run with no partial result.
/// `InsufficientSamples` is handled inside the engine by clustering the
/// unreduced vectors, and `Timeout` only surfaces when a caller asks for a
/// converged result explicitly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// A vector does not match the dimension established for the run.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// A response id was inserted twice.
    #[error("duplicate response id {id}")]
    DuplicateId {
        /// The colliding id.
        id: u64,
    },

    /// Requested cluster count is incompatible with the dataset.
    #[error("cannot create {requested} clusters from {n_items} items")]
    InvalidK {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// The candidate K range for automatic selection is empty.
    #[error("no valid cluster count in [{k_min}, {k_max}] for {n_items} items")]
    NoValidK {
        /// Number of items.
        n_items: usize,
        /// Requested lower bound.
        k_min: usize,
        /// Requested upper bound.
        k_max: usize,
    },

    /// Too few samples to build a neighborhood graph.
    #[error("insufficient samples: {n_items} items, at least {required} required")]
    InsufficientSamples {
        /// Number of items.
        n_items: usize,
        /// Minimum required.
        required: usize,
    },

    /// The distance model rejected a vector.
    #[error("invalid vector for metric (id {id}): {reason}")]
    InvalidMetric {
        /// Id of the offending response.
        id: u64,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An iterative step hit its cap without converging.
    #[error("did not converge after {iterations} iterations")]
    Timeout {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// The embedding collaborator failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Configuration could not be parsed or serialized.
    #[error("configuration error: {0}")]
    Config(String),
}
