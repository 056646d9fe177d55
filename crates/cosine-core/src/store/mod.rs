//! Storage abstraction for Cosine.
//!
//! The [`Store`] trait defines the primitive reads and writes that the
//! content, annotation, timeline, neighbor, and sampling modules compose.
//! Ranking, grouping, and pagination policy live in those modules, not in
//! the backends, so every backend paginates identically.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! Every read that returns annotations (other than
//! [`annotation_history`](Store::annotation_history)) must exclude rows
//! whose `deleted_at` is set.

pub mod memory;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Annotation, AnnotationView, Content, CorpusStats, User};

/// Phase-1 row of a grouped timeline: a content hash and its ordering key.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityMark {
    pub hash: String,
    pub text: String,
    /// Latest active-annotation `created_at` for the hash (optionally
    /// restricted to one owner).
    pub latest_at: DateTime<Utc>,
}

/// A pinned annotation together with its content text.
#[derive(Debug, Clone, PartialEq)]
pub struct PinnedRow {
    pub text: String,
    pub annotation: AnnotationView,
}

/// A content hash and its embedding, as scanned for neighbor ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRow {
    pub hash: String,
    pub embedding: Vec<f32>,
}

/// Abstract storage backend for Cosine.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_content_if_absent`](Store::insert_content_if_absent) | Idempotent content insert |
/// | [`latest_activity`](Store::latest_activity) | Timeline phase 1 |
/// | [`active_annotations`](Store::active_annotations) | Timeline/neighbor phase 2 |
/// | [`scan_embeddings`](Store::scan_embeddings) | Linear scan for neighbor ranking |
/// | [`annotated_hash_at`](Store::annotated_hash_at) | Random sampling |
#[async_trait]
pub trait Store: Send + Sync {
    // ---- contents ----

    /// Insert a content row unless one with the same hash exists.
    ///
    /// Returns `true` if this call created the row. The first insert wins;
    /// a losing concurrent insert is a silent no-op.
    async fn insert_content_if_absent(&self, content: &Content) -> Result<bool>;

    async fn get_content(&self, hash: &str) -> Result<Option<Content>>;

    async fn get_embedding(&self, hash: &str) -> Result<Option<Vec<f32>>>;

    /// Texts for the given hashes; missing hashes are absent from the map.
    async fn get_texts(&self, hashes: &[String]) -> Result<HashMap<String, String>>;

    /// Every content row's embedding, in no particular order.
    async fn scan_embeddings(&self) -> Result<Vec<EmbeddingRow>>;

    // ---- annotations ----

    async fn insert_annotation(&self, annotation: &Annotation) -> Result<()>;

    /// All annotations (deleted included) for `(hash, owner)`, newest first.
    async fn owner_annotations(&self, hash: &str, owner_id: &str) -> Result<Vec<Annotation>>;

    async fn set_pinned_at(&self, annotation_id: &str, pinned_at: Option<DateTime<Utc>>)
        -> Result<()>;

    async fn set_deleted_at(&self, annotation_id: &str, deleted_at: DateTime<Utc>) -> Result<()>;

    /// Stamp `deleted_at` on every active annotation for `(hash, owner)`.
    /// Returns the number of rows changed.
    async fn delete_active_for_owner(
        &self,
        hash: &str,
        owner_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Active annotations on any of `hashes`, joined with usernames,
    /// ordered by `created_at` ascending.
    async fn active_annotations(&self, hashes: &[String]) -> Result<Vec<AnnotationView>>;

    /// Every annotation on `hash`, deleted included, oldest first.
    async fn annotation_history(&self, hash: &str) -> Result<Vec<Annotation>>;

    // ---- timelines ----

    /// Per-hash maximum active-annotation `created_at`, optionally restricted
    /// to one owner's annotations, strictly before `before`, ordered by that
    /// maximum descending then hash ascending, at most `limit` rows.
    async fn latest_activity(
        &self,
        owner_id: Option<&str>,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ActivityMark>>;

    /// Active, pinned annotations of `owner_id` with `pinned_at` strictly
    /// before `before`, ordered by `pinned_at` descending then id ascending.
    async fn pinned_annotations(
        &self,
        owner_id: &str,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<PinnedRow>>;

    // ---- sampling ----

    /// Number of content hashes with at least one active annotation.
    async fn annotated_count(&self) -> Result<usize>;

    /// The `index`-th annotated hash in hash order, if it exists.
    async fn annotated_hash_at(&self, index: usize) -> Result<Option<String>>;

    // ---- users ----

    /// Insert the user if unknown; an existing row keeps its username.
    async fn ensure_user(&self, id: &str) -> Result<User>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn set_username(&self, id: &str, username: &str) -> Result<()>;

    // ---- stats ----

    async fn stats(&self) -> Result<CorpusStats>;
}
