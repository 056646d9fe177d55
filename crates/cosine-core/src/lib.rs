//! # Cosine Core
//!
//! Storage-agnostic logic for Cosine: content hashing and dedup, the
//! annotation model, the [`store::Store`] abstraction, cursor-paginated
//! timelines, nearest-neighbor ranking, and random sampling.
//!
//! This crate contains no tokio, sqlx, or network dependencies. The
//! application crate supplies a SQLite-backed store and concrete
//! embedding providers.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`content`] | Content hashing, idempotent insert, text submission |
//! | [`annotation`] | Per-owner annotations: add, pin toggle, soft delete |
//! | [`timeline`] | Recent, authored, and pinned feeds |
//! | [`neighbors`] | Cosine-distance neighbor search |
//! | [`sample`] | Uniform random pick among annotated content |
//! | [`users`] | Username validation and lookup |
//! | [`embedding`] | Embedding provider trait and vector helpers |
//! | [`store`] | Storage trait and in-memory backend |

pub mod annotation;
pub mod content;
pub mod embedding;
pub mod error;
pub mod models;
pub mod neighbors;
pub mod page;
pub mod sample;
pub mod store;
pub mod timeline;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{CosineError, CosineResult};
pub use models::{Actor, ANON_OWNER};
