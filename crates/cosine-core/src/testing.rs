//! Test doubles shared by the core unit tests.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::content::{compute_hash, insert_if_absent, normalize};
use crate::embedding::EmbeddingProvider;
use crate::store::Store;

/// Deterministic embedder: each text maps to a fixed vector derived from its
/// bytes, unless an explicit vector was registered for it.
pub struct FakeEmbedder {
    dims: usize,
    declared_dims: usize,
    fixed: HashMap<String, Vec<f32>>,
}

impl FakeEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            declared_dims: dims,
            fixed: HashMap::new(),
        }
    }

    /// Report `dims` from [`EmbeddingProvider::dims`] while still producing
    /// vectors of the constructed size.
    pub fn declaring_dims(mut self, dims: usize) -> Self {
        self.declared_dims = dims;
        self
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(normalize(text), vector);
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.fixed.get(&normalize(text)) {
            return v.clone();
        }
        let mut v = vec![0.0f32; self.dims];
        for (i, b) in normalize(text).bytes().enumerate() {
            v[i % self.dims] += f32::from(b) / 255.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake"
    }

    fn dims(&self) -> usize {
        self.declared_dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("provider unavailable")
    }
}

/// Insert a content row (no annotation) and return its hash.
pub async fn seed_content<S: Store + ?Sized>(store: &S, text: &str) -> String {
    seed_with_vector(store, text, vec![1.0, 0.0, 0.0]).await
}

pub async fn seed_with_vector<S: Store + ?Sized>(store: &S, text: &str, vector: Vec<f32>) -> String {
    let hash = compute_hash(text);
    insert_if_absent(store, &hash, text.trim(), &vector)
        .await
        .expect("seed content");
    hash
}
