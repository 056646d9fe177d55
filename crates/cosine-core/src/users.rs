//! Local user records: display names and username resolution.
//!
//! Identity itself belongs to the authentication layer. The core only keeps
//! enough to join a username onto annotations and to resolve a username in
//! a feed URL back to an owner id.

use serde::Serialize;

use crate::error::{CosineError, CosineResult};
use crate::models::{Actor, User};
use crate::store::Store;

const USERNAME_RULE: &str =
    "Username must be 3-20 characters and contain only letters, numbers, underscores, or hyphens";

/// Answer to "can I take this username?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 3 to 20 ASCII letters, digits, `_` or `-`.
pub fn validate_username(username: &str) -> CosineResult<()> {
    if username.is_empty() {
        return Err(CosineError::invalid("Username is required"));
    }
    let len_ok = (3..=20).contains(&username.len());
    let chars_ok = username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if !(len_ok && chars_ok) {
        return Err(CosineError::invalid(USERNAME_RULE));
    }
    Ok(())
}

/// Format check plus a uniqueness lookup. A malformed name is reported as
/// unavailable with the validation message rather than as an error.
pub async fn check_availability<S: Store + ?Sized>(
    store: &S,
    username: &str,
) -> CosineResult<Availability> {
    if let Err(e) = validate_username(username) {
        return Ok(Availability {
            available: false,
            error: Some(match e {
                CosineError::InvalidInput(msg) => msg,
                other => other.to_string(),
            }),
        });
    }
    let taken = store.find_user_by_username(username).await?.is_some();
    Ok(Availability {
        available: !taken,
        error: None,
    })
}

/// Claim `username` for the actor. Re-claiming one's own name is a no-op.
pub async fn set_username<S: Store + ?Sized>(
    store: &S,
    actor: &Actor,
    username: &str,
) -> CosineResult<User> {
    let user_id = actor.require_user()?;
    validate_username(username)?;

    if let Some(existing) = store.find_user_by_username(username).await? {
        if existing.id != user_id {
            return Err(CosineError::invalid("Username is already taken"));
        }
    }

    store.ensure_user(user_id).await?;
    store.set_username(user_id, username).await?;
    tracing::info!(user = user_id, username, "username set");

    Ok(store.ensure_user(user_id).await?)
}

pub async fn find_by_username<S: Store + ?Sized>(store: &S, username: &str) -> CosineResult<User> {
    store
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| CosineError::not_found(format!("user {}", username)))
}

/// Record an authenticated actor so its annotations can be joined to a
/// username. Anonymous actors are ignored.
pub async fn remember<S: Store + ?Sized>(store: &S, actor: &Actor) -> CosineResult<()> {
    if let Actor::User { id, username } = actor {
        store.ensure_user(id).await?;
        if let Some(name) = username {
            if validate_username(name).is_ok()
                && store.find_user_by_username(name).await?.is_none()
            {
                store.set_username(id, name).await?;
            }
        }
    }
    Ok(())
}
