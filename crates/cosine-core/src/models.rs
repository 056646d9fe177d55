//! Core data models used throughout Cosine.
//!
//! Content rows are keyed by their normalized-text hash; annotations are the
//! per-owner claims on a content row. Read paths hand out
//! [`AnnotationView`]s, which carry the owner's display name.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CosineError, CosineResult};

/// Owner id recorded for submissions made without a session.
pub const ANON_OWNER: &str = "anon";

/// Who is performing an operation, as resolved by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User {
        id: String,
        username: Option<String>,
    },
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Actor::User {
            id: id.into(),
            username: None,
        }
    }

    /// Owner id written on annotations (`"anon"` for anonymous actors).
    pub fn owner_id(&self) -> &str {
        match self {
            Actor::Anonymous => ANON_OWNER,
            Actor::User { id, .. } => id,
        }
    }

    /// The user id, or [`CosineError::Unauthorized`] for anonymous actors.
    pub fn require_user(&self) -> CosineResult<&str> {
        match self {
            Actor::Anonymous => Err(CosineError::Unauthorized),
            Actor::User { id, .. } => Ok(id),
        }
    }
}

/// Deduplicated text plus its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub hash: String,
    /// Trimmed submission, original casing.
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A single owner's claim on a piece of content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub id: String,
    pub content_hash: String,
    pub owner_id: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Annotation {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Active annotation joined with its owner's username.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationView {
    pub id: String,
    pub content_hash: String,
    pub owner_id: String,
    pub username: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub pinned_at: Option<DateTime<Utc>>,
}

/// Locally known user, used for display joins and username lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of submitting a text.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub hash: String,
    pub text: String,
    /// `false` when the content already existed and only an annotation was added.
    pub created_content: bool,
    pub annotation: Annotation,
}

/// A content row with every active annotation on it.
#[derive(Debug, Clone, Serialize)]
pub struct ContentDetail {
    pub hash: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub annotations: Vec<AnnotationView>,
}

/// One grouped entry of a timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineItem {
    pub hash: String,
    pub text: String,
    /// The ordering key for this feed (latest activity or pin time).
    pub latest_at: DateTime<Utc>,
    pub annotations: Vec<AnnotationView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelinePage {
    pub items: Vec<TimelineItem>,
    /// `None` once the feed is exhausted.
    pub next_cursor: Option<String>,
}

/// A content row ranked by distance from a source content.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborItem {
    pub hash: String,
    pub text: String,
    /// Cosine distance in `[0, 2]`.
    pub distance: f64,
    /// `1 - distance`, for display.
    pub similarity: f64,
    pub annotations: Vec<AnnotationView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborPage {
    pub items: Vec<NeighborItem>,
    pub next_offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinState {
    pub is_pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReceipt {
    pub deleted_at: DateTime<Utc>,
}

/// Corpus-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub contents: i64,
    pub active_annotations: i64,
    pub deleted_annotations: i64,
    pub pinned_annotations: i64,
    /// Content rows with zero active annotations.
    pub orphaned_contents: i64,
    /// Distinct owners with at least one active annotation.
    pub owners: i64,
}

static LAST_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current time truncated to microseconds, the precision every backend stores.
///
/// Strictly increasing within a process: a call landing on the same
/// microsecond as the previous one is bumped forward by 1µs, so feed
/// cursors never fall between two writes that share a timestamp.
pub fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_MICROS.load(Ordering::Relaxed);
    let micros = loop {
        let next = now.max(last + 1);
        match LAST_MICROS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => break next,
            Err(seen) => last = seen,
        }
    };
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}
