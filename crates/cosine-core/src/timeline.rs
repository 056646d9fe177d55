//! Grouped, cursor-paginated feeds.
//!
//! Recent and authored feeds are built in two phases:
//!
//! 1. **Page selection**: the store returns one [`ActivityMark`] per content
//!    hash, keyed by the latest active-annotation time, strictly older than
//!    the cursor, newest first, at most `limit` rows.
//! 2. **Hydration**: every active annotation on the selected hashes (all
//!    owners) is fetched and grouped under its content in phase-1 order.
//!
//! Paging is done on content groups, never on annotation rows, so a group
//! is never split across pages. `next_cursor` is the ordering key of the
//! last item and is only emitted for a full page.
//!
//! [`ActivityMark`]: crate::store::ActivityMark

use indexmap::IndexMap;

use crate::error::CosineResult;
use crate::models::{TimelineItem, TimelinePage};
use crate::page::{format_cursor, parse_cursor};
use crate::store::{ActivityMark, Store};

/// Global feed of recently annotated content.
pub async fn recent<S: Store + ?Sized>(
    store: &S,
    cursor: Option<&str>,
    limit: usize,
) -> CosineResult<TimelinePage> {
    grouped(store, None, cursor, limit).await
}

/// Content `owner_id` has annotated, ordered by that owner's latest
/// annotation. Each item still lists every owner's active annotations.
pub async fn authored<S: Store + ?Sized>(
    store: &S,
    owner_id: &str,
    cursor: Option<&str>,
    limit: usize,
) -> CosineResult<TimelinePage> {
    grouped(store, Some(owner_id), cursor, limit).await
}

/// `owner_id`'s pinned annotations, most recently pinned first. Each item
/// carries only that owner's annotation.
pub async fn pinned<S: Store + ?Sized>(
    store: &S,
    owner_id: &str,
    cursor: Option<&str>,
    limit: usize,
) -> CosineResult<TimelinePage> {
    let before = parse_cursor(cursor)?;
    let rows = store.pinned_annotations(owner_id, before, limit).await?;
    let full = rows.len() == limit;

    let items: Vec<TimelineItem> = rows
        .into_iter()
        .filter_map(|row| {
            let pinned_at = row.annotation.pinned_at?;
            Some(TimelineItem {
                hash: row.annotation.content_hash.clone(),
                text: row.text,
                latest_at: pinned_at,
                annotations: vec![row.annotation],
            })
        })
        .collect();

    Ok(TimelinePage {
        next_cursor: next_cursor(&items, full),
        items,
    })
}

async fn grouped<S: Store + ?Sized>(
    store: &S,
    owner_id: Option<&str>,
    cursor: Option<&str>,
    limit: usize,
) -> CosineResult<TimelinePage> {
    let before = parse_cursor(cursor)?;
    let marks = store.latest_activity(owner_id, before, limit).await?;
    let full = marks.len() == limit;

    let hashes: Vec<String> = marks.iter().map(|m| m.hash.clone()).collect();
    let annotations = if hashes.is_empty() {
        Vec::new()
    } else {
        store.active_annotations(&hashes).await?
    };

    let mut groups: IndexMap<String, TimelineItem> = marks
        .into_iter()
        .map(|ActivityMark { hash, text, latest_at }| {
            let item = TimelineItem {
                hash: hash.clone(),
                text,
                latest_at,
                annotations: Vec::new(),
            };
            (hash, item)
        })
        .collect();

    for annotation in annotations {
        if let Some(item) = groups.get_mut(&annotation.content_hash) {
            item.annotations.push(annotation);
        }
    }

    let items: Vec<TimelineItem> = groups.into_values().collect();
    tracing::debug!(owner = ?owner_id, items = items.len(), full, "timeline page built");

    Ok(TimelinePage {
        next_cursor: next_cursor(&items, full),
        items,
    })
}

fn next_cursor(items: &[TimelineItem], full: bool) -> Option<String> {
    if !full {
        return None;
    }
    items.last().map(|item| format_cursor(item.latest_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation;
    use crate::models::{Actor, Annotation};
    use crate::store::memory::InMemoryStore;
    use crate::testing::seed_content;
    use chrono::{DateTime, Duration, Utc};

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000 + seconds, 0).unwrap()
    }

    async fn annotate(store: &InMemoryStore, hash: &str, owner: &str, when: DateTime<Utc>) -> Annotation {
        let annotation = Annotation {
            id: format!("{}-{}-{}", owner, &hash[..8], when.timestamp()),
            content_hash: hash.to_string(),
            owner_id: owner.to_string(),
            notes: None,
            created_at: when,
            pinned_at: None,
            deleted_at: None,
        };
        store.insert_annotation(&annotation).await.unwrap();
        annotation
    }

    /// Ten texts annotated at t = 0..10, newest last.
    async fn ten_texts(store: &InMemoryStore) -> Vec<String> {
        let mut hashes = Vec::new();
        for i in 0..10 {
            let hash = seed_content(store, &format!("text number {}", i)).await;
            annotate(store, &hash, "alice", at(i)).await;
            hashes.push(hash);
        }
        hashes
    }

    #[tokio::test]
    async fn cursor_iteration_visits_every_group_once_in_order() {
        let store = InMemoryStore::new();
        let hashes = ten_texts(&store).await;

        let mut seen = Vec::new();
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = recent(&store, cursor.as_deref(), 3).await.unwrap();
            for item in &page.items {
                seen.push(item.hash.clone());
                keys.push(item.latest_at);
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), hashes.len());
        let mut expected = hashes.clone();
        expected.reverse();
        assert_eq!(seen, expected);
        assert!(keys.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn partial_page_has_no_cursor() {
        let store = InMemoryStore::new();
        ten_texts(&store).await;
        let page = recent(&store, None, 25).await.unwrap();
        assert_eq!(page.items.len(), 10);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn exact_full_page_emits_cursor_then_empty_page() {
        let store = InMemoryStore::new();
        ten_texts(&store).await;
        let page = recent(&store, None, 10).await.unwrap();
        let cursor = page.next_cursor.expect("full page has a cursor");
        let next = recent(&store, Some(&cursor), 10).await.unwrap();
        assert!(next.items.is_empty());
        assert!(next.next_cursor.is_none());
    }

    #[tokio::test]
    async fn groups_are_ordered_by_latest_annotation() {
        let store = InMemoryStore::new();
        let old = seed_content(&store, "old text").await;
        let new = seed_content(&store, "new text").await;
        annotate(&store, &old, "alice", at(0)).await;
        annotate(&store, &new, "bob", at(5)).await;
        annotate(&store, &old, "carol", at(10)).await;

        let page = recent(&store, None, 10).await.unwrap();
        let order: Vec<&str> = page.items.iter().map(|i| i.hash.as_str()).collect();
        assert_eq!(order, vec![old.as_str(), new.as_str()]);
        assert_eq!(page.items[0].annotations.len(), 2);
        assert_eq!(page.items[0].latest_at, at(10));
    }

    #[tokio::test]
    async fn deleted_annotations_do_not_surface_or_order() {
        let store = InMemoryStore::new();
        let a = seed_content(&store, "a").await;
        let b = seed_content(&store, "b").await;
        annotate(&store, &a, "alice", at(0)).await;
        annotate(&store, &b, "bob", at(1)).await;
        annotate(&store, &a, "carol", at(2)).await;
        annotation::soft_delete(&store, &a, &Actor::user("carol")).await.unwrap();

        let page = recent(&store, None, 10).await.unwrap();
        assert_eq!(page.items[0].hash, b);
        assert_eq!(page.items[1].hash, a);
        assert_eq!(page.items[1].latest_at, at(0));
        assert!(page.items[1].annotations.iter().all(|x| x.owner_id != "carol"));
    }

    #[tokio::test]
    async fn fully_deleted_content_leaves_the_feed() {
        let store = InMemoryStore::new();
        let a = seed_content(&store, "gone").await;
        annotate(&store, &a, "alice", at(0)).await;
        annotation::soft_delete(&store, &a, &Actor::user("alice")).await.unwrap();
        let page = recent(&store, None, 10).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn authored_orders_by_owner_but_shows_everyone() {
        let store = InMemoryStore::new();
        let a = seed_content(&store, "first").await;
        let b = seed_content(&store, "second").await;
        annotate(&store, &a, "alice", at(5)).await;
        annotate(&store, &b, "alice", at(1)).await;
        annotate(&store, &b, "bob", at(9)).await;

        let page = authored(&store, "alice", None, 10).await.unwrap();
        let order: Vec<&str> = page.items.iter().map(|i| i.hash.as_str()).collect();
        assert_eq!(order, vec![a.as_str(), b.as_str()]);
        assert_eq!(page.items[1].latest_at, at(1));
        let owners: Vec<&str> = page.items[1]
            .annotations
            .iter()
            .map(|x| x.owner_id.as_str())
            .collect();
        assert_eq!(owners, vec!["alice", "bob"]);

        assert!(authored(&store, "nobody", None, 10).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn pinned_shows_only_the_owner_annotation() {
        let store = InMemoryStore::new();
        let a = seed_content(&store, "pinned one").await;
        let b = seed_content(&store, "pinned two").await;
        let alice_a = annotate(&store, &a, "alice", at(0)).await;
        let alice_b = annotate(&store, &b, "alice", at(1)).await;
        annotate(&store, &a, "bob", at(2)).await;

        store.set_pinned_at(&alice_a.id, Some(at(20))).await.unwrap();
        store.set_pinned_at(&alice_b.id, Some(at(10))).await.unwrap();

        let page = pinned(&store, "alice", None, 10).await.unwrap();
        let order: Vec<&str> = page.items.iter().map(|i| i.hash.as_str()).collect();
        assert_eq!(order, vec![a.as_str(), b.as_str()]);
        assert_eq!(page.items[0].annotations.len(), 1);
        assert_eq!(page.items[0].annotations[0].owner_id, "alice");
        assert_eq!(page.items[0].latest_at, at(20));
    }

    #[tokio::test]
    async fn pinned_pages_by_pin_time() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            let hash = seed_content(&store, &format!("pin {}", i)).await;
            let a = annotate(&store, &hash, "alice", at(i)).await;
            store
                .set_pinned_at(&a.id, Some(at(100) + Duration::seconds(i)))
                .await
                .unwrap();
        }

        let first = pinned(&store, "alice", None, 3).await.unwrap();
        assert_eq!(first.items.len(), 3);
        let second = pinned(&store, "alice", first.next_cursor.as_deref(), 3)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.next_cursor.is_none());
        assert!(first.items[2].latest_at > second.items[0].latest_at);
    }

    #[tokio::test]
    async fn unpinned_and_deleted_pins_are_excluded() {
        let store = InMemoryStore::new();
        let a = seed_content(&store, "was pinned").await;
        let b = seed_content(&store, "deleted pin").await;
        annotate(&store, &a, "alice", at(0)).await;
        annotate(&store, &b, "alice", at(1)).await;
        let alice = Actor::user("alice");

        annotation::toggle_pin(&store, &a, &alice).await.unwrap();
        annotation::toggle_pin(&store, &a, &alice).await.unwrap();
        annotation::toggle_pin(&store, &b, &alice).await.unwrap();
        annotation::soft_delete(&store, &b, &alice).await.unwrap();

        assert!(pinned(&store, "alice", None, 10).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn hello_world_lifecycle() {
        let store = InMemoryStore::new();
        let embedder = crate::testing::FakeEmbedder::new(4);
        let alice = Actor::user("alice");

        let sub = crate::content::submit(&store, &embedder, &alice, "Hello World", None)
            .await
            .unwrap();
        let h = sub.hash;

        let feed = recent(&store, None, 20).await.unwrap();
        assert_eq!(feed.items[0].hash, h);
        assert_eq!(feed.items[0].annotations[0].owner_id, "alice");

        annotation::toggle_pin(&store, &h, &alice).await.unwrap();
        let pins = pinned(&store, "alice", None, 20).await.unwrap();
        assert_eq!(pins.items[0].hash, h);

        annotation::soft_delete(&store, &h, &alice).await.unwrap();
        assert!(recent(&store, None, 20).await.unwrap().items.is_empty());
        assert!(pinned(&store, "alice", None, 20).await.unwrap().items.is_empty());
        assert_eq!(crate::content::get(&store, &h).await.unwrap().text, "Hello World");
    }

    #[tokio::test]
    async fn bad_cursor_is_rejected() {
        let store = InMemoryStore::new();
        assert!(recent(&store, Some("not a time"), 10).await.is_err());
    }
}
