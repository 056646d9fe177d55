//! Corpus statistics.
//!
//! `cosine stats` prints how much content is stored, how much of it is
//! still claimed by someone, and how many people are contributing.

use anyhow::Result;

use crate::config::Config;
use crate::service::Cosine;

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(cosine: &Cosine, config: &Config) -> Result<()> {
    let stats = cosine.stats().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Cosine Database Stats");
    println!("=====================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!("  Embeddings:   {} ({} dims)", cosine.embedder().model_name(), cosine.embedder().dims());
    println!();
    println!("  Texts:        {}", stats.contents);
    println!(
        "  Orphaned:     {} ({}%)",
        stats.orphaned_contents,
        percent(stats.orphaned_contents, stats.contents)
    );
    println!("  Annotations:  {} active, {} deleted", stats.active_annotations, stats.deleted_annotations);
    println!("  Pinned:       {}", stats.pinned_annotations);
    println!("  Contributors: {}", stats.owners);
    println!();

    Ok(())
}

fn percent(part: i64, whole: i64) -> i64 {
    if whole > 0 {
        (part * 100) / whole
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
