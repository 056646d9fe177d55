//! The application handle.
//!
//! [`Cosine`] owns the store, the embedding provider, and the page limits.
//! It is built once with [`Cosine::init`] and passed to the CLI commands
//! and the HTTP server; nothing is held in global state.

use std::sync::Arc;

use sqlx::SqlitePool;

use cosine_core::embedding::EmbeddingProvider;
use cosine_core::models::{
    Annotation, ContentDetail, CorpusStats, DeleteReceipt, NeighborPage, PinState, Submission,
    TimelinePage, User,
};
use cosine_core::page::PageLimits;
use cosine_core::store::Store;
use cosine_core::users::Availability;
use cosine_core::{annotation, content, neighbors, sample, timeline, users, Actor, CosineResult};

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
pub struct Cosine {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    limits: PageLimits,
    batch_size: usize,
    pool: Option<SqlitePool>,
}

impl Cosine {
    /// Open the configured database (applying the schema if needed) and
    /// construct the embedding provider.
    pub async fn init(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        let embedder = create_provider(&config.embedding)?;

        Ok(Self {
            store: Arc::new(SqliteStore::new(pool.clone())),
            embedder,
            limits: config.feeds.limits(),
            batch_size: config.embedding.batch_size,
            pool: Some(pool),
        })
    }

    /// Assemble a handle from explicit parts (tests, alternative backends).
    pub fn from_parts(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        limits: PageLimits,
    ) -> Self {
        Self {
            store,
            embedder,
            limits,
            batch_size: 20,
            pool: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Close the connection pool. Other clones of the handle stop working.
    pub async fn shutdown(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
            tracing::debug!("database pool closed");
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Record the actor's user row so its annotations carry a username.
    pub async fn remember(&self, actor: &Actor) -> CosineResult<()> {
        users::remember(self.store(), actor).await
    }

    // ---- content ----

    pub async fn submit(
        &self,
        actor: &Actor,
        text: &str,
        notes: Option<&str>,
    ) -> CosineResult<Submission> {
        self.remember(actor).await?;
        content::submit(self.store(), self.embedder(), actor, text, notes).await
    }

    pub async fn detail(&self, hash: &str) -> CosineResult<ContentDetail> {
        content::detail(self.store(), hash).await
    }

    pub async fn history(&self, hash: &str) -> CosineResult<Vec<Annotation>> {
        content::get(self.store(), hash).await?;
        annotation::history(self.store(), hash).await
    }

    // ---- annotations ----

    pub async fn toggle_pin(&self, actor: &Actor, hash: &str) -> CosineResult<PinState> {
        annotation::toggle_pin(self.store(), hash, actor).await
    }

    pub async fn delete(&self, actor: &Actor, hash: &str) -> CosineResult<DeleteReceipt> {
        annotation::soft_delete(self.store(), hash, actor).await
    }

    // ---- feeds ----

    pub async fn recent(
        &self,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> CosineResult<TimelinePage> {
        let limit = self.limits.resolve(limit)?;
        timeline::recent(self.store(), cursor, limit).await
    }

    /// Texts annotated by the user with `username`.
    pub async fn authored_by(
        &self,
        username: &str,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> CosineResult<TimelinePage> {
        let limit = self.limits.resolve(limit)?;
        let user = users::find_by_username(self.store(), username).await?;
        timeline::authored(self.store(), &user.id, cursor, limit).await
    }

    /// Texts pinned by the user with `username`.
    pub async fn pinned_by(
        &self,
        username: &str,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> CosineResult<TimelinePage> {
        let limit = self.limits.resolve(limit)?;
        let user = users::find_by_username(self.store(), username).await?;
        timeline::pinned(self.store(), &user.id, cursor, limit).await
    }

    /// Owner-id addressed variants, for callers that already hold an id.
    pub async fn authored_by_id(
        &self,
        owner_id: &str,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> CosineResult<TimelinePage> {
        let limit = self.limits.resolve(limit)?;
        timeline::authored(self.store(), owner_id, cursor, limit).await
    }

    pub async fn pinned_by_id(
        &self,
        owner_id: &str,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> CosineResult<TimelinePage> {
        let limit = self.limits.resolve(limit)?;
        timeline::pinned(self.store(), owner_id, cursor, limit).await
    }

    // ---- search & sampling ----

    pub async fn neighbors(
        &self,
        hash: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> CosineResult<NeighborPage> {
        let limit = self.limits.resolve(limit)?;
        neighbors::find_neighbors(self.store(), hash, offset, limit).await
    }

    pub async fn random(&self) -> CosineResult<String> {
        sample::pick_random(self.store()).await
    }

    // ---- users ----

    pub async fn check_username(&self, username: &str) -> CosineResult<Availability> {
        users::check_availability(self.store(), username).await
    }

    pub async fn set_username(&self, actor: &Actor, username: &str) -> CosineResult<User> {
        users::set_username(self.store(), actor, username).await
    }

    pub async fn stats(&self) -> CosineResult<CorpusStats> {
        Ok(self.store.stats().await?)
    }
}
