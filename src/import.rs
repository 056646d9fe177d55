//! Bulk import of texts from a JSON file.
//!
//! The file holds an array whose entries are either plain strings or
//! objects:
//!
//! ```json
//! [
//!   "Rain tastes different when you're not running from it.",
//!   { "text": "Code is poetry.", "notes": "seed", "owner": "u-1", "username": "maya_chen" }
//! ]
//! ```
//!
//! Texts are embedded `batch_size` at a time with one provider call per
//! batch, then written one by one through the normal submission path, so
//! duplicates collapse onto existing content exactly as interactive
//! submissions do.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cosine_core::content::{check_dims, compute_hash, submit_embedded};
use cosine_core::{Actor, CosineError, CosineResult};

use crate::service::Cosine;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImportEntry {
    Text(String),
    Full {
        text: String,
        #[serde(default)]
        notes: Option<String>,
        /// User id to attribute the text to; overrides the default actor.
        #[serde(default)]
        owner: Option<String>,
        #[serde(default)]
        username: Option<String>,
    },
}

impl ImportEntry {
    fn text(&self) -> &str {
        match self {
            ImportEntry::Text(text) | ImportEntry::Full { text, .. } => text,
        }
    }

    fn notes(&self) -> Option<&str> {
        match self {
            ImportEntry::Text(_) => None,
            ImportEntry::Full { notes, .. } => notes.as_deref(),
        }
    }

    fn actor(&self, default: &Actor) -> Actor {
        match self {
            ImportEntry::Full {
                owner: Some(owner),
                username,
                ..
            } => Actor::User {
                id: owner.clone(),
                username: username.clone(),
            },
            _ => default.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub submitted: usize,
    /// Submissions that created a new content row.
    pub new_contents: usize,
    /// Submissions that landed on existing content.
    pub deduplicated: usize,
    /// Blank entries that were ignored.
    pub skipped: usize,
}

pub fn read_entries(path: &Path) -> Result<Vec<ImportEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse import file: {}", path.display()))
}

/// Embed and submit every entry, attributing plain entries to `default_actor`.
pub async fn import_entries(
    cosine: &Cosine,
    entries: &[ImportEntry],
    default_actor: &Actor,
) -> CosineResult<ImportReport> {
    let mut report = ImportReport::default();

    let pending: Vec<&ImportEntry> = entries
        .iter()
        .filter(|e| !e.text().trim().is_empty())
        .collect();
    report.skipped = entries.len() - pending.len();

    for batch in pending.chunks(cosine.batch_size()) {
        let texts: Vec<String> = batch.iter().map(|e| e.text().trim().to_string()).collect();
        let vectors = cosine
            .embedder()
            .embed_batch(&texts)
            .await
            .map_err(CosineError::EmbeddingProvider)?;
        if vectors.len() != texts.len() {
            return Err(CosineError::EmbeddingProvider(anyhow::anyhow!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &vectors {
            check_dims(cosine.embedder(), vector)?;
        }

        for ((entry, text), vector) in batch.iter().zip(&texts).zip(&vectors) {
            let actor = entry.actor(default_actor);
            cosine.remember(&actor).await?;
            let hash = compute_hash(text);
            let submission =
                submit_embedded(cosine.store(), &actor, text, &hash, vector, entry.notes()).await?;

            report.submitted += 1;
            if submission.created_content {
                report.new_contents += 1;
            } else {
                report.deduplicated += 1;
            }
        }

        tracing::info!(
            batch = texts.len(),
            submitted = report.submitted,
            "import batch written"
        );
    }

    Ok(report)
}

/// `cosine import <file>`
pub async fn run_import(cosine: &Cosine, path: &Path, actor: &Actor) -> Result<()> {
    let entries = read_entries(path)?;
    println!("Importing {} entries from {}...", entries.len(), path.display());

    let report = import_entries(cosine, &entries, actor).await?;

    println!("Import complete:");
    println!("  submitted:    {}", report.submitted);
    println!("  new texts:    {}", report.new_contents);
    println!("  deduplicated: {}", report.deduplicated);
    if report.skipped > 0 {
        println!("  skipped:      {} (blank)", report.skipped);
    }
    Ok(())
}
