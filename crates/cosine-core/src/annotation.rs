//! Annotation layer: per-owner claims on content.
//!
//! Annotations are append-only from the caller's point of view: `add`
//! always inserts, and the only mutations are the owner's pin toggle and
//! soft delete. Nothing is ever hard-deleted.
//!
//! # Owner lookup
//!
//! The same owner may hold several annotations on one content (nothing
//! prevents a second submission). A pin toggle resolves `(hash, owner)` to
//! a single row: the newest active annotation if there is one, otherwise
//! the newest annotation overall. A soft delete stamps every active row of
//! the pair, so none of them stays visible; with no active row left it
//! re-stamps the newest one (last write wins).

use uuid::Uuid;

use crate::error::{CosineError, CosineResult};
use crate::models::{timestamp_now, Actor, Annotation, DeleteReceipt, PinState};
use crate::store::Store;

/// Insert a new annotation for `owner_id` on `hash`.
pub async fn add<S: Store + ?Sized>(
    store: &S,
    hash: &str,
    owner_id: &str,
    notes: Option<&str>,
) -> CosineResult<Annotation> {
    let annotation = Annotation {
        id: Uuid::new_v4().to_string(),
        content_hash: hash.to_string(),
        owner_id: owner_id.to_string(),
        notes: notes
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        created_at: timestamp_now(),
        pinned_at: None,
        deleted_at: None,
    };
    store.insert_annotation(&annotation).await?;
    Ok(annotation)
}

/// Resolve the annotation a mutation by `owner_id` on `hash` applies to.
pub async fn find_for_owner<S: Store + ?Sized>(
    store: &S,
    hash: &str,
    owner_id: &str,
) -> CosineResult<Option<Annotation>> {
    let rows = store.owner_annotations(hash, owner_id).await?;
    let chosen = rows
        .iter()
        .find(|a| a.is_active())
        .or_else(|| rows.first())
        .cloned();
    Ok(chosen)
}

/// Flip the actor's pin on `hash` between unset and now.
pub async fn toggle_pin<S: Store + ?Sized>(
    store: &S,
    hash: &str,
    actor: &Actor,
) -> CosineResult<PinState> {
    let owner_id = actor.require_user()?;
    let annotation = find_for_owner(store, hash, owner_id)
        .await?
        .ok_or_else(|| {
            CosineError::not_found("annotation (you must add this text before pinning it)")
        })?;

    let pinned_at = match annotation.pinned_at {
        Some(_) => None,
        None => Some(timestamp_now()),
    };
    store.set_pinned_at(&annotation.id, pinned_at).await?;

    tracing::info!(hash, owner = owner_id, pinned = pinned_at.is_some(), "pin toggled");
    Ok(PinState {
        is_pinned: pinned_at.is_some(),
        pinned_at,
    })
}

/// Soft-delete the actor's annotation on `hash`.
pub async fn soft_delete<S: Store + ?Sized>(
    store: &S,
    hash: &str,
    actor: &Actor,
) -> CosineResult<DeleteReceipt> {
    let owner_id = actor.require_user()?;
    let rows = store.owner_annotations(hash, owner_id).await?;
    let Some(newest) = rows.first() else {
        return Err(CosineError::not_found(format!("text {}", hash)));
    };

    let deleted_at = timestamp_now();
    let mut changed = store
        .delete_active_for_owner(hash, owner_id, deleted_at)
        .await?;
    if changed == 0 {
        store.set_deleted_at(&newest.id, deleted_at).await?;
        changed = 1;
    }

    tracing::info!(hash, owner = owner_id, rows = changed, "annotation soft-deleted");
    Ok(DeleteReceipt { deleted_at })
}

/// Every annotation on `hash`, including soft-deleted rows.
///
/// This is the only read path that returns deleted annotations.
pub async fn history<S: Store + ?Sized>(store: &S, hash: &str) -> CosineResult<Vec<Annotation>> {
    Ok(store.annotation_history(hash).await?)
}
