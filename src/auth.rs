//! Request authentication.
//!
//! Sessions are issued elsewhere; Cosine only needs to turn request headers
//! into an [`Actor`]. The bundled [`TokenAuthenticator`] accepts bearer
//! tokens of the form
//!
//! ```text
//! <user_id>.<hex HMAC-SHA256(secret, user_id)>
//! ```
//!
//! which `cosine token <user_id>` mints. A request without an
//! `Authorization` header is anonymous; a request with a bad one is
//! rejected rather than downgraded.

use anyhow::{anyhow, Result};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use cosine_core::{Actor, CosineError, CosineResult};

use crate::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

/// Resolves the acting user for a request.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> CosineResult<Actor>;
}

/// Authenticator used when no signing secret is configured: everyone is
/// anonymous, and presenting credentials is an error.
pub struct AnonymousOnly;

impl Authenticator for AnonymousOnly {
    fn authenticate(&self, headers: &HeaderMap) -> CosineResult<Actor> {
        match headers.get(AUTHORIZATION) {
            None => Ok(Actor::Anonymous),
            Some(_) => Err(CosineError::Unauthorized),
        }
    }
}

/// HMAC-signed bearer tokens.
pub struct TokenAuthenticator {
    secret: Vec<u8>,
}

impl TokenAuthenticator {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Read the secret from the environment variable named in `[auth]`.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let secret = std::env::var(&config.secret_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.secret_env))?;
        if secret.is_empty() {
            anyhow::bail!("{} must not be empty", config.secret_env);
        }
        Ok(Self::new(secret))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| anyhow!("invalid HMAC key: {}", e))
    }

    pub fn mint(&self, user_id: &str) -> Result<String> {
        if user_id.is_empty() {
            anyhow::bail!("user id must not be empty");
        }
        let mut mac = self.mac()?;
        mac.update(user_id.as_bytes());
        Ok(format!(
            "{}.{}",
            user_id,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// The user id a token was minted for, if its signature checks out.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (user_id, signature) = token.rsplit_once('.')?;
        if user_id.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(user_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(user_id.to_string())
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> CosineResult<Actor> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(Actor::Anonymous);
        };
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(CosineError::Unauthorized)?;

        match self.verify(token) {
            Some(id) => Ok(Actor::user(id)),
            None => {
                tracing::debug!("rejected bearer token");
                Err(CosineError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn minted_token_verifies() {
        let auth = TokenAuthenticator::new("s3cret");
        let token = auth.mint("user-42").unwrap();
        assert!(token.starts_with("user-42."));
        assert_eq!(auth.verify(&token).as_deref(), Some("user-42"));
    }

    #[test]
    fn user_ids_may_contain_dots() {
        let auth = TokenAuthenticator::new("s3cret");
        let token = auth.mint("ada.lovelace").unwrap();
        assert_eq!(auth.verify(&token).as_deref(), Some("ada.lovelace"));
    }

    #[test]
    fn tampered_or_foreign_tokens_fail() {
        let auth = TokenAuthenticator::new("s3cret");
        let other = TokenAuthenticator::new("different");
        let token = auth.mint("alice").unwrap();
        let forged = token.replacen("alice", "mallory", 1);

        assert!(auth.verify(&forged).is_none());
        assert!(other.verify(&token).is_none());
        assert!(auth.verify("alice").is_none());
        assert!(auth.verify("alice.nothex").is_none());
    }

    #[test]
    fn headers_resolve_actor() {
        let auth = TokenAuthenticator::new("s3cret");
        let token = auth.mint("alice").unwrap();

        assert_eq!(auth.authenticate(&HeaderMap::new()).unwrap(), Actor::Anonymous);
        assert_eq!(auth.authenticate(&bearer(&token)).unwrap(), Actor::user("alice"));
        assert!(matches!(
            auth.authenticate(&bearer("alice.00")),
            Err(CosineError::Unauthorized)
        ));
    }

    #[test]
    fn anonymous_only_rejects_credentials() {
        assert_eq!(AnonymousOnly.authenticate(&HeaderMap::new()).unwrap(), Actor::Anonymous);
        assert!(AnonymousOnly.authenticate(&bearer("x.00")).is_err());
    }
}
