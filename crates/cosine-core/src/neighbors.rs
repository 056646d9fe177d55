//! Exact nearest-neighbor search over content embeddings.
//!
//! Every content row is scored against the source embedding by cosine
//! distance; there is no approximate index. Orphaned content (no active
//! annotations) is ranked like any other row and removed only after the
//! page has been cut, so a page may hold fewer than `limit` items while
//! later pages still exist.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::embedding::cosine_distance;
use crate::error::CosineResult;
use crate::models::{AnnotationView, NeighborItem, NeighborPage};
use crate::store::Store;

/// Rank all other content by distance from `hash`.
///
/// An unknown source hash yields an empty page rather than an error.
pub async fn find_neighbors<S: Store + ?Sized>(
    store: &S,
    hash: &str,
    offset: usize,
    limit: usize,
) -> CosineResult<NeighborPage> {
    let Some(source) = store.get_embedding(hash).await? else {
        return Ok(NeighborPage {
            items: Vec::new(),
            next_offset: None,
        });
    };

    let rows = store.scan_embeddings().await?;
    let scanned = rows.len();

    let mut ranked: Vec<(String, f64)> = rows
        .into_iter()
        .filter(|row| row.hash != hash)
        .map(|row| {
            let distance = cosine_distance(&source, &row.embedding);
            (row.hash, distance)
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let slice: Vec<(String, f64)> = ranked.into_iter().skip(offset).take(limit).collect();
    let full = slice.len() == limit;

    let hashes: Vec<String> = slice.iter().map(|(h, _)| h.clone()).collect();
    let (texts, annotations) = if hashes.is_empty() {
        (HashMap::new(), Vec::new())
    } else {
        (
            store.get_texts(&hashes).await?,
            store.active_annotations(&hashes).await?,
        )
    };

    let mut by_hash: HashMap<String, Vec<AnnotationView>> = HashMap::new();
    for annotation in annotations {
        by_hash
            .entry(annotation.content_hash.clone())
            .or_default()
            .push(annotation);
    }

    let items: Vec<NeighborItem> = slice
        .into_iter()
        .filter_map(|(hash, distance)| {
            let annotations = by_hash.remove(&hash)?;
            let text = texts.get(&hash)?.clone();
            Some(NeighborItem {
                hash,
                text,
                distance,
                similarity: 1.0 - distance,
                annotations,
            })
        })
        .collect();

    tracing::debug!(source = hash, scanned, offset, returned = items.len(), "neighbor scan");

    Ok(NeighborPage {
        items,
        next_offset: full.then_some(offset + limit),
    })
}
