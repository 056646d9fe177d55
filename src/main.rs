//! # Cosine CLI (`cosine`)
//!
//! Submit texts, browse the grouped feeds, explore semantic neighbors, and
//! run the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! cosine --config ./config/cosine.toml [--as <user_id>] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cosine init` | Create the SQLite database and run schema migrations |
//! | `cosine add "<text>"` | Submit a text (deduplicated by normalized hash) |
//! | `cosine show <hash>` | Print a text and its active annotations |
//! | `cosine recent` | Recent-activity feed |
//! | `cosine texts <username>` | Texts a user annotated |
//! | `cosine pinned <username>` | Texts a user pinned |
//! | `cosine pin <hash>` | Toggle your pin on a text |
//! | `cosine delete <hash>` | Soft-delete your annotation |
//! | `cosine neighbors <hash>` | Nearest texts by cosine distance |
//! | `cosine random` | Hash of a random annotated text |
//! | `cosine import <file>` | Bulk-submit texts from a JSON file |
//! | `cosine stats` | Corpus counters |
//! | `cosine user set <name>` | Claim a username |
//! | `cosine token <user_id>` | Mint a bearer token for the HTTP API |
//! | `cosine serve` | Start the HTTP server |

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cosine::auth::TokenAuthenticator;
use cosine::config::{self, Config};
use cosine::service::Cosine;
use cosine::texts::{self, Feed};
use cosine::{import, migrate, server, stats};
use cosine_core::Actor;

/// Cosine: deduplicated texts, shared annotations, semantic neighbors.
#[derive(Parser)]
#[command(name = "cosine", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cosine.toml")]
    config: PathBuf,

    /// Act as this user id. Without it, commands run anonymously.
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    as_user: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Submit a text.
    ///
    /// Texts are deduplicated by the SHA-256 of their trimmed, lowercased
    /// form; submitting a known text adds your annotation to it.
    Add {
        text: String,

        /// Free-form notes stored on your annotation.
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show a text with its active annotations.
    Show {
        hash: String,

        /// Also list deleted annotations.
        #[arg(long)]
        history: bool,
    },

    /// Texts ordered by latest annotation activity.
    Recent {
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Texts annotated by a user.
    Texts {
        username: String,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Texts pinned by a user.
    Pinned {
        username: String,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Toggle your pin on a text. Requires `--as`.
    Pin { hash: String },

    /// Soft-delete your annotation on a text. Requires `--as`.
    Delete { hash: String },

    /// Nearest texts by cosine distance.
    Neighbors {
        hash: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the hash of a random annotated text.
    Random,

    /// Bulk-submit texts from a JSON array of strings or objects.
    Import { file: PathBuf },

    /// Show corpus statistics.
    Stats,

    /// Manage usernames.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Mint a bearer token for a user id (needs the auth secret set).
    Token { user_id: String },

    /// Start the HTTP server.
    Serve,
}

#[derive(Subcommand)]
enum UserAction {
    /// Claim a username for the `--as` user.
    Set { username: String },
    /// Check whether a username is valid and free.
    Check { username: String },
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    let actor = match &cli.as_user {
        Some(id) => Actor::user(id.clone()),
        None => Actor::Anonymous,
    };

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Token { user_id } => {
            let auth = TokenAuthenticator::from_config(&cfg.auth)?;
            println!("{}", auth.mint(&user_id)?);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        command => {
            let cosine = Cosine::init(&cfg).await?;
            let result = run_command(&cosine, &cfg, &actor, command).await;
            cosine.shutdown().await;
            result?;
        }
    }

    Ok(())
}

async fn run_command(
    cosine: &Cosine,
    cfg: &Config,
    actor: &Actor,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Add { text, notes } => {
            texts::run_add(cosine, actor, &text, notes.as_deref()).await
        }
        Commands::Show { hash, history } => texts::run_show(cosine, &hash, history).await,
        Commands::Recent { cursor, limit } => {
            texts::run_feed(cosine, Feed::Recent, cursor.as_deref(), limit).await
        }
        Commands::Texts {
            username,
            cursor,
            limit,
        } => texts::run_feed(cosine, Feed::Authored(&username), cursor.as_deref(), limit).await,
        Commands::Pinned {
            username,
            cursor,
            limit,
        } => texts::run_feed(cosine, Feed::Pinned(&username), cursor.as_deref(), limit).await,
        Commands::Pin { hash } => texts::run_pin(cosine, actor, &hash).await,
        Commands::Delete { hash } => texts::run_delete(cosine, actor, &hash).await,
        Commands::Neighbors {
            hash,
            offset,
            limit,
        } => texts::run_neighbors(cosine, &hash, offset, limit).await,
        Commands::Random => texts::run_random(cosine).await,
        Commands::Import { file } => import::run_import(cosine, &file, actor).await,
        Commands::Stats => stats::run_stats(cosine, cfg).await,
        Commands::User {
            action: UserAction::Set { username },
        } => texts::run_set_username(cosine, actor, &username).await,
        Commands::User {
            action: UserAction::Check { username },
        } => texts::run_check_username(cosine, &username).await,
        Commands::Init | Commands::Token { .. } | Commands::Serve => Ok(()),
    }
}
