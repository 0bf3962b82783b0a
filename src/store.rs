//! In-memory vector store for one analysis run.

use crate::embed::Embedder;
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// One embedded survey response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseVector {
    /// Stable id for the duration of the run.
    pub id: u64,
    /// Original response text.
    pub text: String,
    /// Embedding of `text`.
    pub vector: Vec<f32>,
}

/// Holds response embeddings in insertion order.
///
/// The first inserted vector fixes the dimension `D` for the store.
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    items: Vec<ResponseVector>,
    index: HashMap<u64, usize>,
    dim: Option<usize>,
}

impl VectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed `texts` and store them under ids `0..N` in input order.
    pub fn from_texts<E, S>(texts: &[S], embedder: &E) -> Result<Self>
    where
        E: Embedder + ?Sized,
        S: AsRef<str>,
    {
        if texts.is_empty() {
            return Err(Error::EmptyInput);
        }
        let refs: Vec<&str> = texts.iter().map(|t| t.as_ref()).collect();
        let vectors = embedder.embed_batch(&refs)?;
        if vectors.len() != refs.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                refs.len()
            )));
        }

        let mut store = Self::new();
        store.add_batch(
            refs.into_iter()
                .zip(vectors)
                .enumerate()
                .map(|(i, (text, vector))| ResponseVector {
                    id: i as u64,
                    text: text.to_string(),
                    vector,
                })
                .collect(),
        )?;
        Ok(store)
    }

    /// Add one response.
    pub fn add(&mut self, id: u64, text: impl Into<String>, vector: Vec<f32>) -> Result<()> {
        self.check(id, &vector, self.dim)?;
        self.dim.get_or_insert(vector.len());
        self.index.insert(id, self.items.len());
        self.items.push(ResponseVector {
            id,
            text: text.into(),
            vector,
        });
        Ok(())
    }

    /// Add a batch atomically: either every item is inserted or none is.
    pub fn add_batch(&mut self, batch: Vec<ResponseVector>) -> Result<()> {
        if batch.is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut dim = self.dim;
        let mut seen: HashSet<u64> = HashSet::with_capacity(batch.len());
        for item in &batch {
            self.check(item.id, &item.vector, dim)?;
            if !seen.insert(item.id) {
                return Err(Error::DuplicateId { id: item.id });
            }
            dim.get_or_insert(item.vector.len());
        }

        self.dim = dim;
        for item in batch {
            self.index.insert(item.id, self.items.len());
            self.items.push(item);
        }
        Ok(())
    }

    fn check(&self, id: u64, vector: &[f32], dim: Option<usize>) -> Result<()> {
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateId { id });
        }
        if let Some(expected) = dim {
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    found: vector.len(),
                });
            }
        }
        Ok(())
    }

    /// All responses in insertion order.
    pub fn get_all(&self) -> &[ResponseVector] {
        &self.items
    }

    /// Look up a response by id.
    pub fn get(&self, id: u64) -> Option<&ResponseVector> {
        self.index.get(&id).map(|&i| &self.items[i])
    }

    /// Insertion position of `id`.
    pub fn position(&self, id: u64) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Number of stored responses.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store holds no responses.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Established embedding dimension, if any vector was added.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    /// Content fingerprint over ids, texts and vector bytes (SHA-256, hex).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for item in &self.items {
            hasher.update(item.id.to_le_bytes());
            hasher.update((item.text.len() as u64).to_le_bytes());
            hasher.update(item.text.as_bytes());
            for x in &item.vector {
                hasher.update(x.to_le_bytes());
            }
        }
        hex(&hasher.finalize())
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
