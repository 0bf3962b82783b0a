//! Embedding seam.
//!
//! The embedding model is an external collaborator. This module only defines
//! the contract (`text -> vector of fixed dimension`) so callers can plug in a
//! local encoder, a remote API, or a closure in tests.

use crate::error::{Error, Result};
use crate::keywords::KeywordExtractor;

/// Turns a response text into a fixed-length vector.
pub trait Embedder {
    /// Embed one text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// A function-based embedder.
#[derive(Clone)]
pub struct FnEmbedder<F> {
    f: F,
}

impl<F> FnEmbedder<F> {
    /// Create an embedder from a function.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Embedder for FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>>,
{
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (self.f)(text)
    }
}

/// Create an embedder from a closure.
pub fn from_fn<F>(f: F) -> FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>>,
{
    FnEmbedder::new(f)
}

/// Default output dimension of [`HashingEmbedder`].
pub const DEFAULT_HASH_DIMENSION: usize = 256;

/// Bag-of-words embedder using feature hashing.
///
/// Needs no model, so it serves offline runs and tests. Content terms (see
/// [`KeywordExtractor::terms`]) are hashed with FNV-1a into `dimension`
/// buckets, counted, and the vector is L2-normalized. A text with no content
/// terms maps to the unit vector on bucket 0.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    extractor: KeywordExtractor,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASH_DIMENSION,
            extractor: KeywordExtractor::new(),
        }
    }
}

impl HashingEmbedder {
    /// Create an embedder with `dimension` buckets.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidParameter {
                name: "dimension",
                message: "must be at least 1",
            });
        }
        Ok(Self {
            dimension,
            ..Self::default()
        })
    }

    /// Output dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn bucket(&self, term: &str) -> usize {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in term.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % self.dimension as u64) as usize
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dimension];
        for term in self.extractor.terms(text) {
            v[self.bucket(&term)] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        } else {
            v[0] = 1.0;
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_embedder_batch_preserves_order() {
        let embedder = from_fn(|t: &str| Ok(vec![t.len() as f32, 1.0]));
        let out = embedder.embed_batch(&["a", "abc", "ab"]).unwrap();
        assert_eq!(out, vec![vec![1.0, 1.0], vec![3.0, 1.0], vec![2.0, 1.0]]);
    }

    #[test]
    fn test_fn_embedder_propagates_failure() {
        let embedder = from_fn(|_t: &str| Err(Error::Embedding("model offline".into())));
        assert!(matches!(embedder.embed("x"), Err(Error::Embedding(_))));
    }

    #[test]
    fn test_hashing_embedder_is_normalized_and_stable() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed("Great service").unwrap();
        let b = embedder.embed("great   SERVICE!").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);

        let empty = embedder.embed("the and").unwrap();
        assert_eq!(empty[0], 1.0);
        assert!(HashingEmbedder::new(0).is_err());
    }
}
