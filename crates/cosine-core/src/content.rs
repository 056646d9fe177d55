//! Content store: hashing, idempotent insert, lookups, and text submission.
//!
//! A content row is identified by the SHA-256 of its normalized text
//! (trimmed, lowercased). Two submissions that differ only in surrounding
//! whitespace or letter case share a row; internal whitespace and
//! punctuation are significant.

use sha2::{Digest, Sha256};

use crate::annotation;
use crate::embedding::EmbeddingProvider;
use crate::error::{CosineError, CosineResult};
use crate::models::{timestamp_now, Actor, Content, ContentDetail, Submission};
use crate::store::Store;

/// Text normalization applied before hashing.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `trim(text).to_lowercase()`.
///
/// ```rust
/// use cosine_core::content::compute_hash;
///
/// assert_eq!(compute_hash("  Hello World\n"), compute_hash("hello world"));
/// assert_eq!(compute_hash("hello world").len(), 64);
/// ```
pub fn compute_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Insert a content row unless the hash already exists.
///
/// Returns whether this call created the row. The stored text and
/// embedding for a hash are always whatever was inserted first.
pub async fn insert_if_absent<S: Store + ?Sized>(
    store: &S,
    hash: &str,
    text: &str,
    embedding: &[f32],
) -> CosineResult<bool> {
    let content = Content {
        hash: hash.to_string(),
        text: text.to_string(),
        embedding: embedding.to_vec(),
        created_at: timestamp_now(),
    };
    let created = store.insert_content_if_absent(&content).await?;
    if !created {
        tracing::debug!(hash, "content already present, insert skipped");
    }
    Ok(created)
}

pub async fn get<S: Store + ?Sized>(store: &S, hash: &str) -> CosineResult<Content> {
    store
        .get_content(hash)
        .await?
        .ok_or_else(|| CosineError::not_found(format!("text {}", hash)))
}

pub async fn get_embedding<S: Store + ?Sized>(store: &S, hash: &str) -> CosineResult<Vec<f32>> {
    store
        .get_embedding(hash)
        .await?
        .ok_or_else(|| CosineError::not_found(format!("text {}", hash)))
}

/// Content plus every active annotation on it. Orphaned content is still
/// returned, with an empty annotation list.
pub async fn detail<S: Store + ?Sized>(store: &S, hash: &str) -> CosineResult<ContentDetail> {
    let content = get(store, hash).await?;
    let annotations = store.active_annotations(&[content.hash.clone()]).await?;
    Ok(ContentDetail {
        hash: content.hash,
        text: content.text,
        created_at: content.created_at,
        annotations,
    })
}

/// Submit a text on behalf of `actor`.
///
/// The embedding is generated before anything is written: a provider
/// failure leaves the store untouched. The content row is deduplicated;
/// an annotation is always added.
pub async fn submit<S, E>(
    store: &S,
    embedder: &E,
    actor: &Actor,
    text: &str,
    notes: Option<&str>,
) -> CosineResult<Submission>
where
    S: Store + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CosineError::invalid("text must not be empty"));
    }

    let hash = compute_hash(trimmed);
    let embedding = embedder
        .embed(trimmed)
        .await
        .map_err(CosineError::EmbeddingProvider)?;
    check_dims(embedder, &embedding)?;

    submit_embedded(store, actor, trimmed, &hash, &embedding, notes).await
}

/// Write path shared by [`submit`] and bulk import, for text that has
/// already been embedded.
pub async fn submit_embedded<S: Store + ?Sized>(
    store: &S,
    actor: &Actor,
    trimmed: &str,
    hash: &str,
    embedding: &[f32],
    notes: Option<&str>,
) -> CosineResult<Submission> {
    let created_content = insert_if_absent(store, hash, trimmed, embedding).await?;
    let annotation = annotation::add(store, hash, actor.owner_id(), notes).await?;

    tracing::info!(
        hash,
        owner = actor.owner_id(),
        created_content,
        "text submitted"
    );

    Ok(Submission {
        hash: hash.to_string(),
        text: trimmed.to_string(),
        created_content,
        annotation,
    })
}

/// Reject vectors whose length differs from the provider's declared dims.
pub fn check_dims<E: EmbeddingProvider + ?Sized>(embedder: &E, vector: &[f32]) -> CosineResult<()> {
    if vector.len() != embedder.dims() {
        return Err(CosineError::EmbeddingProvider(anyhow::anyhow!(
            "{} returned a {}-dimensional vector, expected {}",
            embedder.model_name(),
            vector.len(),
            embedder.dims()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::testing::{FailingEmbedder, FakeEmbedder};

    #[test]
    fn hash_is_sha256_of_trimmed_lowercase() {
        // sha256("hello world")
        assert_eq!(
            compute_hash("  Hello World \n"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn hash_keeps_internal_whitespace_and_punctuation() {
        assert_ne!(compute_hash("hello  world"), compute_hash("hello world"));
        assert_ne!(compute_hash("hello, world"), compute_hash("hello world"));
    }

    #[test]
    fn hash_is_unicode_aware() {
        assert_eq!(compute_hash("ÉCOLE"), compute_hash("école"));
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_first_writer() {
        let store = InMemoryStore::new();
        let hash = compute_hash("dup");
        assert!(insert_if_absent(&store, &hash, "Dup", &[1.0, 0.0]).await.unwrap());
        assert!(!insert_if_absent(&store, &hash, "DUP", &[0.0, 1.0]).await.unwrap());

        let content = get(&store, &hash).await.unwrap();
        assert_eq!(content.text, "Dup");
        assert_eq!(content.embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(
            get(&store, "nope").await,
            Err(CosineError::NotFound(_))
        ));
        assert!(matches!(
            get_embedding(&store, "nope").await,
            Err(CosineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn submit_dedups_content_but_not_annotations() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new(4);

        let first = submit(&store, &embedder, &Actor::user("alice"), "Hello World", None)
            .await
            .unwrap();
        let second = submit(&store, &embedder, &Actor::user("bob"), "  hello world  ", Some("me too"))
            .await
            .unwrap();

        assert_eq!(first.hash, second.hash);
        assert!(first.created_content);
        assert!(!second.created_content);
        assert_ne!(first.annotation.id, second.annotation.id);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.contents, 1);
        assert_eq!(stats.active_annotations, 2);

        let stored = get(&store, &first.hash).await.unwrap();
        assert_eq!(stored.text, "Hello World");
    }

    #[tokio::test]
    async fn submit_records_anonymous_owner() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new(4);
        let sub = submit(&store, &embedder, &Actor::Anonymous, "quiet", None)
            .await
            .unwrap();
        assert_eq!(sub.annotation.owner_id, "anon");
    }

    #[tokio::test]
    async fn submit_rejects_blank_text() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new(4);
        let err = submit(&store, &embedder, &Actor::Anonymous, "   \n", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CosineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn embedding_failure_writes_nothing() {
        let store = InMemoryStore::new();
        let err = submit(&store, &FailingEmbedder, &Actor::user("alice"), "doomed", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CosineError::EmbeddingProvider(_)));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.contents, 0);
        assert_eq!(stats.active_annotations, 0);
    }

    #[tokio::test]
    async fn wrong_dimension_is_a_provider_error() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new(4).declaring_dims(8);
        let err = submit(&store, &embedder, &Actor::Anonymous, "short", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CosineError::EmbeddingProvider(_)));
        assert!(store.get_content(&compute_hash("short")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn detail_lists_active_annotations_only() {
        let store = InMemoryStore::new();
        let embedder = FakeEmbedder::new(4);
        let sub = submit(&store, &embedder, &Actor::user("alice"), "shared", None)
            .await
            .unwrap();
        submit(&store, &embedder, &Actor::user("bob"), "shared", None)
            .await
            .unwrap();
        annotation::soft_delete(&store, &sub.hash, &Actor::user("alice"))
            .await
            .unwrap();

        let detail = detail(&store, &sub.hash).await.unwrap();
        let owners: Vec<&str> = detail.annotations.iter().map(|a| a.owner_id.as_str()).collect();
        assert_eq!(owners, vec!["bob"]);
    }
}
