//! CLI output for the text, feed, and search commands.
//!
//! Each `run_*` function performs one operation through [`Cosine`] and
//! prints a human-readable result to stdout. Logs go to stderr, so stdout
//! stays clean for piping.

use anyhow::Result;
use chrono::{DateTime, Utc};

use cosine_core::models::{AnnotationView, TimelinePage};
use cosine_core::Actor;

use crate::service::Cosine;

/// Which grouped feed to print.
pub enum Feed<'a> {
    Recent,
    Authored(&'a str),
    Pinned(&'a str),
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}

fn when(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

fn who(annotation: &AnnotationView) -> &str {
    annotation
        .username
        .as_deref()
        .unwrap_or(annotation.owner_id.as_str())
}

fn print_annotations(annotations: &[AnnotationView]) {
    for a in annotations {
        let pin = if a.pinned_at.is_some() { " [pinned]" } else { "" };
        match &a.notes {
            Some(notes) => println!("      {} · {}{} · {}", who(a), when(a.created_at), pin, notes),
            None => println!("      {} · {}{}", who(a), when(a.created_at), pin),
        }
    }
}

/// `cosine add "<text>"`
pub async fn run_add(cosine: &Cosine, actor: &Actor, text: &str, notes: Option<&str>) -> Result<()> {
    let submission = cosine.submit(actor, text, notes).await?;
    let status = if submission.created_content {
        "added"
    } else {
        "already known, annotated"
    };
    println!("{} ({})", submission.hash, status);
    Ok(())
}

/// `cosine show <hash>`
pub async fn run_show(cosine: &Cosine, hash: &str, history: bool) -> Result<()> {
    let detail = cosine.detail(hash).await?;

    println!("hash:    {}", detail.hash);
    println!("created: {}", detail.created_at.to_rfc3339());
    println!();
    println!("{}", detail.text);
    println!();
    println!("annotations ({}):", detail.annotations.len());
    print_annotations(&detail.annotations);

    if history {
        let rows = cosine.history(hash).await?;
        println!();
        println!("history ({} rows):", rows.len());
        for row in rows {
            let state = match row.deleted_at {
                Some(ts) => format!("deleted {}", when(ts)),
                None => "active".to_string(),
            };
            println!("      {} · {} · {}", row.owner_id, when(row.created_at), state);
        }
    }
    Ok(())
}

/// `cosine recent`, `cosine texts <username>`, `cosine pinned <username>`
pub async fn run_feed(
    cosine: &Cosine,
    feed: Feed<'_>,
    cursor: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let page: TimelinePage = match feed {
        Feed::Recent => cosine.recent(cursor, limit).await?,
        Feed::Authored(username) => cosine.authored_by(username, cursor, limit).await?,
        Feed::Pinned(username) => cosine.pinned_by(username, cursor, limit).await?,
    };

    if page.items.is_empty() {
        println!("No texts.");
        return Ok(());
    }

    for (i, item) in page.items.iter().enumerate() {
        println!(
            "{}. {}  {}  {}",
            i + 1,
            short(&item.hash),
            when(item.latest_at),
            preview(&item.text, 72)
        );
        print_annotations(&item.annotations);
    }

    if let Some(next) = page.next_cursor {
        println!();
        println!("next: --cursor {}", next);
    }
    Ok(())
}

/// `cosine pin <hash>`
pub async fn run_pin(cosine: &Cosine, actor: &Actor, hash: &str) -> Result<()> {
    let state = cosine.toggle_pin(actor, hash).await?;
    match state.pinned_at {
        Some(ts) => println!("pinned {} at {}", short(hash), ts.to_rfc3339()),
        None => println!("unpinned {}", short(hash)),
    }
    Ok(())
}

/// `cosine delete <hash>`
pub async fn run_delete(cosine: &Cosine, actor: &Actor, hash: &str) -> Result<()> {
    let receipt = cosine.delete(actor, hash).await?;
    println!("deleted {} at {}", short(hash), receipt.deleted_at.to_rfc3339());
    Ok(())
}

/// `cosine neighbors <hash>`
pub async fn run_neighbors(
    cosine: &Cosine,
    hash: &str,
    offset: usize,
    limit: Option<usize>,
) -> Result<()> {
    let page = cosine.neighbors(hash, offset, limit).await?;

    if page.items.is_empty() {
        println!("No neighbors.");
    }
    for item in &page.items {
        println!(
            "{:>6.3}  {}  {}",
            item.similarity,
            short(&item.hash),
            preview(&item.text, 72)
        );
    }
    if let Some(next) = page.next_offset {
        println!();
        println!("next: --offset {}", next);
    }
    Ok(())
}

/// `cosine random`
pub async fn run_random(cosine: &Cosine) -> Result<()> {
    let hash = cosine.random().await?;
    println!("{}", hash);
    Ok(())
}

/// `cosine user set <username>`
pub async fn run_set_username(cosine: &Cosine, actor: &Actor, username: &str) -> Result<()> {
    let user = cosine.set_username(actor, username).await?;
    println!(
        "{} is now @{}",
        user.id,
        user.username.as_deref().unwrap_or(username)
    );
    Ok(())
}

/// `cosine user check <username>`
pub async fn run_check_username(cosine: &Cosine, username: &str) -> Result<()> {
    let availability = cosine.check_username(username).await?;
    match (availability.available, availability.error) {
        (true, _) => println!("@{} is available", username),
        (false, Some(reason)) => println!("@{} is not valid: {}", username, reason),
        (false, None) => println!("@{} is taken", username),
    }
    Ok(())
}
