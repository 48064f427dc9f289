//! `shici`: operator CLI for the poetry search store.
//!
//! Reads `shici.toml` (or the path given with `--config`) and `SHICI_*`
//! environment variables, opens the SQLite store, and runs one command.
//!
//! # Usage
//!
//! ```
//! shici init
//! shici status
//! shici search 明月 --limit 5
//! shici fuzzy "abcd" --table line
//! SHICI_EMBEDDING_API_KEY=... shici semantic "思乡,明月"
//! ```

mod embedding;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use shici_core::{
  content::ContentTable,
  service::{SearchService, split_phrases},
  store::SearchStore,
};
use shici_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{embedding::DashScopeClient, settings::Settings};

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Adaptive search over the shici poetry store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "shici.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Probe the native engine, persist the decision, and reconcile indexes.
  Init,
  /// Reconcile indexes with the stored configuration without re-probing.
  Reconcile,
  /// Print the active configuration, lifecycle state and live indexes.
  Status,
  /// Lexical search, topped up with fuzzy matches.
  Search {
    query:  String,
    #[arg(long, value_enum, default_value_t = Table::Document)]
    table:  Table,
    #[arg(long, default_value_t = 10)]
    limit:  usize,
    #[arg(long, default_value_t = 0)]
    offset: usize,
  },
  /// Trigram-similarity search only.
  Fuzzy {
    query: String,
    #[arg(long, value_enum, default_value_t = Table::Document)]
    table: Table,
    #[arg(long, default_value_t = 10)]
    limit: usize,
  },
  /// Meaning-based document search over comma-separated phrases.
  Semantic {
    phrases: String,
    #[arg(long, default_value_t = 10)]
    limit:   usize,
    #[arg(long, default_value_t = 0)]
    offset:  usize,
  },
  /// Build the optional index over embedded lines.
  VectorIndex,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Table {
  Document,
  Line,
}

impl From<Table> for ContentTable {
  fn from(table: Table) -> Self {
    match table {
      Table::Document => ContentTable::Document,
      Table::Line => ContentTable::Line,
    }
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store = SqliteStore::open_with(&settings.store_path, settings.store_options())
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;
  let store = Arc::new(store);
  let options = settings.service_options();

  match cli.command {
    Command::Init => {
      let service = SearchService::bootstrap(store, options).await?;
      print_json(&service.configuration())
    }
    Command::Reconcile => {
      let config = store.load_configuration().await?;
      store.reconcile(config).await?;
      print_json(&config)
    }
    Command::Status => {
      let service = SearchService::open(store, options).await?;
      let diagnostics = service.diagnostics().await?;
      let indexes = service.store().index_inventory().await?;
      print_json(&serde_json::json!({ "diagnostics": diagnostics, "indexes": indexes }))
    }
    Command::Search { query, table, limit, offset } => {
      let service = SearchService::open(store, options).await?;
      let hits = match table {
        Table::Document => service.keyword_search(&query, limit, offset).await?,
        Table::Line => {
          let hits = service
            .merged_search(ContentTable::Line, &query, limit.saturating_add(offset))
            .await?;
          hits.into_iter().skip(offset).collect()
        }
      };
      print_json(&hits)
    }
    Command::Fuzzy { query, table, limit } => {
      let service = SearchService::open(store, options).await?;
      print_json(&service.fuzzy_search(table.into(), &query, limit).await?)
    }
    Command::Semantic { phrases, limit, offset } => {
      let provider_config = settings
        .embedding()
        .context("semantic search needs SHICI_EMBEDDING_API_KEY (or embedding_api_key)")?;
      let provider = DashScopeClient::new(provider_config)?;
      let service = SearchService::open(store, options).await?;
      let docs = service
        .semantic_search(&provider, &split_phrases(&phrases), limit, offset)
        .await?;
      print_json(&docs)
    }
    Command::VectorIndex => {
      store.create_vector_index().await?;
      Ok(())
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
