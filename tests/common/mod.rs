#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use cosine::config::Config;
use cosine::service::Cosine;
use cosine::sqlite_store::SqliteStore;
use cosine::{db, migrate};
use cosine_core::content::normalize;
use cosine_core::embedding::EmbeddingProvider;
use cosine_core::page::PageLimits;

/// Deterministic 3-dimensional embedder. Texts registered with
/// [`StaticEmbedder::with`] get their vector; everything else points along x.
#[derive(Default)]
pub struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl StaticEmbedder {
    pub fn with(mut self, text: &str, vector: [f32; 3]) -> Self {
        self.vectors.insert(normalize(text), vector.to_vec());
        self
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    fn model_name(&self) -> &str {
        "static-test"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(&normalize(t))
                    .cloned()
                    .unwrap_or_else(|| vec![1.0, 0.0, 0.0])
            })
            .collect())
    }
}

/// A [`Cosine`] handle over a fresh SQLite database in a temp directory.
pub async fn sqlite_cosine(embedder: StaticEmbedder, limits: PageLimits) -> (TempDir, Cosine) {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("data/cosine.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();

    let cosine = Cosine::from_parts(
        Arc::new(SqliteStore::new(pool)),
        Arc::new(embedder),
        limits,
    );
    (tmp, cosine)
}
