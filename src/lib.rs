//! # Cosine
//!
//! A shared wall of short texts. Submissions are deduplicated by the
//! SHA-256 of their normalized form, every submitter keeps their own
//! annotation (notes, pin, soft delete), and texts are related to each
//! other by cosine distance between their embeddings.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Embedding   │──▶│ cosine-core  │──▶│  SQLite  │
//! │ OpenAI/Gemini│   │ dedup, feeds │   │  (sqlx)  │
//! │ Ollama/local │   │ neighbors    │   └──────────┘
//! └──────────────┘   └──────┬───────┘
//!                           │
//!                ┌──────────┴──────────┐
//!                ▼                     ▼
//!          ┌──────────┐          ┌──────────┐
//!          │   CLI    │          │   HTTP   │
//!          │ (cosine) │          │  (axum)  │
//!          └──────────┘          └──────────┘
//! ```
//!
//! The domain logic lives in the `cosine-core` crate behind its `Store` and
//! `EmbeddingProvider` traits. This crate supplies the SQLite store, the
//! HTTP embedding providers, configuration, and the two front ends.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | `Store` implementation over sqlx |
//! | [`embedding`] | OpenAI, Ollama, Gemini, and local providers |
//! | [`service`] | The [`service::Cosine`] application handle |
//! | [`auth`] | Bearer-token authentication |
//! | [`server`] | HTTP API |
//! | [`texts`] | CLI output for texts and feeds |
//! | [`import`] | Bulk JSON import |
//! | [`stats`] | Corpus statistics |

pub mod auth;
pub mod config;
pub mod db;
pub mod embedding;
pub mod import;
pub mod migrate;
pub mod server;
pub mod service;
pub mod sqlite_store;
pub mod stats;
pub mod texts;
