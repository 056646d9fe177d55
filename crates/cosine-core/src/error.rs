//! Error taxonomy shared by every core operation.

/// Errors surfaced by Cosine operations.
///
/// Storage and provider plumbing speaks `anyhow`; those failures are wrapped
/// in [`CosineError::Store`] and [`CosineError::EmbeddingProvider`] so
/// callers can still match on the domain variants.
#[derive(Debug, thiserror::Error)]
pub enum CosineError {
    /// Content or annotation is absent.
    #[error("{0} not found")]
    NotFound(String),

    /// A mutation was attempted without a resolved owner.
    #[error("unauthorized")]
    Unauthorized,

    /// Random sampling found no content with an active annotation.
    #[error("no texts found")]
    EmptyCorpus,

    /// The embedding provider failed; nothing was written.
    #[error("embedding provider error: {0:#}")]
    EmbeddingProvider(anyhow::Error),

    /// Caller input was rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The storage backend failed.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type CosineResult<T> = Result<T, CosineError>;

impl CosineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CosineError::NotFound(what.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        CosineError::InvalidInput(message.into())
    }

    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CosineError::NotFound(_) => "not_found",
            CosineError::Unauthorized => "unauthorized",
            CosineError::EmptyCorpus => "empty_corpus",
            CosineError::EmbeddingProvider(_) => "embedding_error",
            CosineError::InvalidInput(_) => "bad_request",
            CosineError::Store(_) => "internal",
        }
    }
}
