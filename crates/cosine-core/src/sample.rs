//! Uniform random selection over annotated content.

use rand::Rng;

use crate::error::{CosineError, CosineResult};
use crate::store::Store;

const MAX_ATTEMPTS: usize = 3;

/// Pick one content hash uniformly among those with at least one active
/// annotation.
///
/// Counting and indexing are separate reads; if the annotated set shrinks in
/// between, the pick is retried against a fresh count.
pub async fn pick_random<S: Store + ?Sized>(store: &S) -> CosineResult<String> {
    for _ in 0..MAX_ATTEMPTS {
        let count = store.annotated_count().await?;
        if count == 0 {
            return Err(CosineError::EmptyCorpus);
        }
        let index = rand::rng().random_range(0..count);
        if let Some(hash) = store.annotated_hash_at(index).await? {
            return Ok(hash);
        }
        tracing::debug!(count, index, "annotated set shrank during sampling, retrying");
    }
    Err(CosineError::EmptyCorpus)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::annotation;
    use crate::models::Actor;
    use crate::store::memory::InMemoryStore;
    use crate::testing::seed_content;

    #[tokio::test]
    async fn empty_store_is_empty_corpus() {
        let store = InMemoryStore::new();
        assert!(matches!(
            pick_random(&store).await,
            Err(CosineError::EmptyCorpus)
        ));
    }

    #[tokio::test]
    async fn orphans_only_is_empty_corpus() {
        let store = InMemoryStore::new();
        let hash = seed_content(&store, "orphan").await;
        annotation::add(&store, &hash, "alice", None).await.unwrap();
        annotation::soft_delete(&store, &hash, &Actor::user("alice"))
            .await
            .unwrap();
        assert!(matches!(
            pick_random(&store).await,
            Err(CosineError::EmptyCorpus)
        ));
    }

    #[tokio::test]
    async fn only_annotated_hashes_are_returned() {
        let store = InMemoryStore::new();
        let mut annotated = HashSet::new();
        for i in 0..4 {
            let hash = seed_content(&store, &format!("kept {}", i)).await;
            annotation::add(&store, &hash, "alice", None).await.unwrap();
            annotated.insert(hash);
        }
        seed_content(&store, "never annotated").await;

        let mut seen = HashSet::new();
        for _ in 0..200 {
            let hash = pick_random(&store).await.unwrap();
            assert!(annotated.contains(&hash));
            seen.insert(hash);
        }
        // 200 draws over 4 items miss one with probability ~4 * 0.75^200.
        assert_eq!(seen, annotated);
    }
}
