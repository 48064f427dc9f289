//! [`SqliteStore`], the SQLite implementation of [`SearchStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use shici_core::{
  config::{ConfigKey, EngineChoice, SearchConfiguration},
  content::{Author, ContentTable, Document, DocumentRow, Dynasty, Line, LineRow, NewDocument, Neighbor, SearchHit},
  store::{IndexInventory, SearchStore},
};

use crate::{
  CapabilityError, Error, Result,
  encode::{decode_dt, encode_dt, encode_vector},
  engine::SqliteEngine,
  functions,
  schema::{SCHEMA, quote},
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Backend tuning that is not part of the persisted engine decision.
#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// FTS5 tokenizer spec for the native engine.
  pub native_tokenizer:     String,
  /// Minimum trigram similarity for fuzzy hits.
  pub similarity_threshold: f64,
  /// Dimensionality of line embeddings.
  pub embedding_dimension:  usize,
  /// How long a writer waits on a locked database (e.g. a concurrent
  /// reconcile) before giving up.
  pub busy_timeout:         Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      native_tokenizer:     "trigram".to_owned(),
      similarity_threshold: 0.3,
      embedding_dimension:  1536,
      busy_timeout:         Duration::from_secs(5),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A search store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn:    tokio_rusqlite::Connection,
  pub(crate) options: std::sync::Arc<StoreOptions>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(StoreOptions::default()).await
  }

  pub async fn open_in_memory_with(options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, options).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let busy_timeout = options.busy_timeout;
    conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        functions::register(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, options: std::sync::Arc::new(options) })
  }

  pub fn options(&self) -> &StoreOptions { &self.options }

  /// Create and drop a scratch FTS5 table with the native tokenizer.
  async fn try_activate_native(&self) -> Result<(), CapabilityError> {
    let tokenize = quote(&self.options.native_tokenizer);
    let ddl = format!(
      "DROP TABLE IF EXISTS temp.shici_native_probe;
       CREATE VIRTUAL TABLE temp.shici_native_probe USING fts5(probe, tokenize={tokenize});
       DROP TABLE temp.shici_native_probe;"
    );
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await
      .map_err(CapabilityError)
  }

  // ── Ingestion ───────────────────────────────────────────────────────────
  //
  // Loaders are external to the search core; these exist so they (and the
  // tests) write rows through a connection with the index functions
  // registered.

  /// Insert a dynasty, or return the existing one with the same name.
  pub async fn add_dynasty(&self, name: &str) -> Result<Dynasty> {
    let name = name.to_owned();
    let id_name = name.clone();
    let id: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO dynasties (name) VALUES (?1)
           ON CONFLICT (name) DO UPDATE SET name = excluded.name
           RETURNING id",
          rusqlite::params![id_name],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(Dynasty { id, name })
  }

  /// Insert an author, or return the existing one for `(name, dynasty)`.
  pub async fn add_author(&self, name: &str, dynasty_id: i64) -> Result<Author> {
    let name = name.to_owned();
    let id_name = name.clone();
    let id: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO authors (name, dynasty_id) VALUES (?1, ?2)
           ON CONFLICT (name, dynasty_id) DO UPDATE SET name = excluded.name
           RETURNING id",
          rusqlite::params![id_name, dynasty_id],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(Author { id, name, dynasty_id })
  }

  /// Insert a document and its lines in one transaction.
  pub async fn add_document(&self, input: NewDocument) -> Result<Document> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);

    let (id, line_ids, input) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO documents (title, author_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![input.title, input.author_id, input.body, at_str],
        )?;
        let id = tx.last_insert_rowid();
        let mut line_ids = Vec::with_capacity(input.lines.len());
        {
          let mut stmt = tx.prepare(
            "INSERT INTO lines (document_id, content, created_at) VALUES (?1, ?2, ?3)",
          )?;
          for content in &input.lines {
            stmt.execute(rusqlite::params![id, content, at_str])?;
            line_ids.push(tx.last_insert_rowid());
          }
        }
        tx.commit()?;
        Ok((id, line_ids, input))
      })
      .await?;

    let lines = line_ids
      .into_iter()
      .zip(input.lines)
      .map(|(line_id, content)| Line { id: line_id, document_id: id, content, created_at })
      .collect();

    Ok(Document {
      id,
      title: input.title,
      author_id: input.author_id,
      body: input.body,
      created_at,
      lines,
    })
  }

  /// Fetch a document with its lines, in insertion order.
  pub async fn get_document(&self, id: i64) -> Result<Option<Document>> {
    type RawLine = (i64, String, String);
    let raw = self
      .conn
      .call(move |conn| {
        let Some((title, author_id, body, created_at)) = conn
          .query_row(
            "SELECT title, author_id, body, created_at FROM documents WHERE id = ?1",
            [id],
            |r| {
              Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
              ))
            },
          )
          .optional()?
        else {
          return Ok(None);
        };
        let mut stmt = conn
          .prepare("SELECT id, content, created_at FROM lines WHERE document_id = ?1 ORDER BY id")?;
        let lines = stmt
          .query_map([id], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
          .collect::<rusqlite::Result<Vec<RawLine>>>()?;
        Ok(Some((title, author_id, body, created_at, lines)))
      })
      .await?;

    let Some((title, author_id, body, created_at, lines)) = raw else {
      return Ok(None);
    };
    let lines = lines
      .into_iter()
      .map(|(line_id, content, at)| {
        Ok(Line { id: line_id, document_id: id, content, created_at: decode_dt(&at)? })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Some(Document { id, title, author_id, body, created_at: decode_dt(&created_at)?, lines }))
  }

  /// Store a line's embedding. Embeddings are write-once.
  pub async fn set_line_embedding(&self, line_id: i64, embedding: &[f32]) -> Result<()> {
    let expected = self.options.embedding_dimension;
    if embedding.len() != expected {
      return Err(shici_core::Error::DimensionMismatch { expected, actual: embedding.len() }.into());
    }
    let blob = encode_vector(embedding);

    let (updated, exists) = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE lines SET embedding = ?2 WHERE id = ?1 AND embedding IS NULL",
          rusqlite::params![line_id, blob],
        )?;
        let exists = updated > 0
          || conn
            .query_row("SELECT 1 FROM lines WHERE id = ?1", [line_id], |_| Ok(()))
            .optional()?
            .is_some();
        Ok((updated, exists))
      })
      .await?;

    match (updated, exists) {
      (0, false) => Err(shici_core::Error::LineNotFound(line_id).into()),
      (0, true) => Err(shici_core::Error::EmbeddingAlreadySet(line_id).into()),
      _ => Ok(()),
    }
  }
}

// ─── SearchStore impl ────────────────────────────────────────────────────────

impl SearchStore for SqliteStore {
  type Engine = SqliteEngine;
  type Error = Error;

  // ── Config store ────────────────────────────────────────────────────────

  async fn set_config(&self, key: ConfigKey, value: &str) -> Result<()> {
    let key_str: &'static str = key.into();
    let value = value.to_owned();
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO search_config (key, value, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
          rusqlite::params![key_str, value, at_str],
        )?;
        Ok(())
      })
      .await?;
    tracing::debug!(%key, "config updated");
    Ok(())
  }

  async fn get_config(&self, key: ConfigKey) -> Result<Option<String>> {
    let key_str: &'static str = key.into();
    let value = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT value FROM search_config WHERE key = ?1",
            rusqlite::params![key_str],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;
    Ok(value)
  }

  // ── Capability ──────────────────────────────────────────────────────────

  async fn probe(&self) -> EngineChoice {
    match self.try_activate_native().await {
      Ok(()) => {
        tracing::info!(tokenizer = %self.options.native_tokenizer, "native engine available");
        EngineChoice::Native
      }
      Err(e) => {
        tracing::info!(error = %e, "falling back to standard engine");
        EngineChoice::Standard
      }
    }
  }

  // ── Index lifecycle ─────────────────────────────────────────────────────

  async fn reconcile(&self, config: SearchConfiguration) -> Result<()> {
    self.reconcile_indexes(config).await
  }

  async fn index_inventory(&self) -> Result<IndexInventory> { self.inventory().await }

  async fn create_vector_index(&self) -> Result<()> { self.build_vector_index().await }

  // ── Queries ─────────────────────────────────────────────────────────────

  fn engine(&self, config: &SearchConfiguration) -> SqliteEngine {
    SqliteEngine::for_config(self.conn.clone(), config)
  }

  async fn fuzzy_search(
    &self,
    table: ContentTable,
    query: &str,
    limit: usize,
  ) -> Result<Vec<SearchHit>> {
    self.trigram_search(table, query, limit).await
  }

  async fn nearest_lines(&self, vector: &[f32], limit: usize) -> Result<Vec<Neighbor<LineRow>>> {
    self.vector_lines(vector, limit).await
  }

  async fn nearest_documents(
    &self,
    vector: &[f32],
    limit: usize,
    offset: usize,
  ) -> Result<Vec<Neighbor<DocumentRow>>> {
    self.vector_documents(vector, limit, offset).await
  }
}
