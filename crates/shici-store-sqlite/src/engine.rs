//! The two lexical strategies.
//!
//! Each strategy owns constant SQL per content table; only bound parameters
//! vary between queries. Before querying, a strategy checks that its index
//! family is live and reports [`shici_core::Error::IndexInconsistency`]
//! otherwise.

use rusqlite::{Connection, OptionalExtension as _};
use shici_core::{
  config::{EngineChoice, SearchConfiguration, TextProfile},
  content::{ContentTable, DocumentRow, LineRow, MatchKind, Row, SearchHit},
  store::LexicalEngine,
  text::{is_blank, query_terms, segment_query},
};

use crate::{Error, Result, schema::spec};

/// Trigram tokenizer window; shorter terms cannot be answered by the index.
const TRIGRAM_WIDTH: usize = 3;

// ─── Native ──────────────────────────────────────────────────────────────────

const NATIVE_DOCUMENTS_MATCH: &str = "
WITH ranked AS MATERIALIZED (
  SELECT rowid AS id, -bm25(documents_native, 2.0, 1.0) AS score
  FROM documents_native
  WHERE documents_native MATCH ?1
)
SELECT d.id, d.title, a.name, y.name, d.body, r.score
FROM ranked r
JOIN documents d ON d.id = r.id
JOIN authors   a ON a.id = d.author_id
JOIN dynasties y ON y.id = a.dynasty_id
WHERE NOT EXISTS (
  SELECT 1 FROM json_each(?2) t
  WHERE instr(lower(d.title || ' ' || d.body), t.value) = 0
)
ORDER BY r.score DESC, d.id
LIMIT ?3";

const NATIVE_DOCUMENTS_SCAN: &str = "
SELECT d.id, d.title, a.name, y.name, d.body,
       (SELECT SUM((length(lower(d.title || ' ' || d.body))
                    - length(replace(lower(d.title || ' ' || d.body), t.value, '')))
                   / length(t.value))
        FROM json_each(?1) t) AS hits
FROM documents_native n
JOIN documents d ON d.id = n.rowid
JOIN authors   a ON a.id = d.author_id
JOIN dynasties y ON y.id = a.dynasty_id
WHERE NOT EXISTS (
  SELECT 1 FROM json_each(?1) t
  WHERE instr(lower(d.title || ' ' || d.body), t.value) = 0
)
ORDER BY hits DESC, d.id
LIMIT ?2";

const NATIVE_LINES_MATCH: &str = "
WITH ranked AS MATERIALIZED (
  SELECT rowid AS id, -bm25(lines_native) AS score
  FROM lines_native
  WHERE lines_native MATCH ?1
)
SELECT l.id, l.document_id, l.content, r.score
FROM ranked r
JOIN lines l ON l.id = r.id
WHERE NOT EXISTS (
  SELECT 1 FROM json_each(?2) t
  WHERE instr(lower(l.content), t.value) = 0
)
ORDER BY r.score DESC, l.id
LIMIT ?3";

const NATIVE_LINES_SCAN: &str = "
SELECT l.id, l.document_id, l.content,
       (SELECT SUM((length(lower(l.content))
                    - length(replace(lower(l.content), t.value, '')))
                   / length(t.value))
        FROM json_each(?1) t) AS hits
FROM lines_native n
JOIN lines l ON l.id = n.rowid
WHERE NOT EXISTS (
  SELECT 1 FROM json_each(?1) t
  WHERE instr(lower(l.content), t.value) = 0
)
ORDER BY hits DESC, l.id
LIMIT ?2";

/// FTS5 over the native multilingual tokenizer.
///
/// Terms of at least [`TRIGRAM_WIDTH`] characters go through the index and
/// are ranked by BM25. Shorter terms are applied as substring filters; when
/// every term is short the table is scanned and rows are scored by
/// occurrence count `h / (h + 1)`.
#[derive(Clone)]
pub struct NativeEngine {
  conn: tokio_rusqlite::Connection,
}

impl NativeEngine {
  pub fn new(conn: tokio_rusqlite::Connection) -> Self { Self { conn } }

  async fn run(&self, table: ContentTable, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    if is_blank(query) || limit == 0 {
      return Ok(Vec::new());
    }
    let (long, short): (Vec<String>, Vec<String>) = query_terms(query)
      .into_iter()
      .partition(|t| t.chars().count() >= TRIGRAM_WIDTH);
    let short_json = serde_json::to_string(&short)?;
    let expr = (!long.is_empty()).then(|| fts_expression(&long));
    let index = spec(table).native;
    let limit_val = limit as i64;

    let hits = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, index)? {
          return Ok(None);
        }
        let hits = match (table, expr) {
          (ContentTable::Document, Some(expr)) => query_documents(
            conn,
            NATIVE_DOCUMENTS_MATCH,
            rusqlite::params![expr, short_json, limit_val],
            |r| r.get(5),
          )?,
          (ContentTable::Document, None) => query_documents(
            conn,
            NATIVE_DOCUMENTS_SCAN,
            rusqlite::params![short_json, limit_val],
            occurrence_score(5),
          )?,
          (ContentTable::Line, Some(expr)) => query_lines(
            conn,
            NATIVE_LINES_MATCH,
            rusqlite::params![expr, short_json, limit_val],
            |r| r.get(3),
          )?,
          (ContentTable::Line, None) => query_lines(
            conn,
            NATIVE_LINES_SCAN,
            rusqlite::params![short_json, limit_val],
            occurrence_score(3),
          )?,
        };
        Ok(Some(hits))
      })
      .await?;

    hits.ok_or_else(|| missing_family(table, EngineChoice::Native))
  }
}

impl LexicalEngine for NativeEngine {
  type Error = Error;

  fn choice(&self) -> EngineChoice { EngineChoice::Native }

  async fn search(&self, table: ContentTable, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    self.run(table, query, limit).await
  }
}

// ─── Standard ────────────────────────────────────────────────────────────────

const STANDARD_DOCUMENTS: &str = "
WITH ranked AS MATERIALIZED (
  SELECT rowid AS id, -bm25(documents_standard, 2.0, 1.0) AS score
  FROM documents_standard
  WHERE documents_standard MATCH ?1
)
SELECT d.id, d.title, a.name, y.name, d.body, r.score
FROM ranked r
JOIN documents d ON d.id = r.id
JOIN authors   a ON a.id = d.author_id
JOIN dynasties y ON y.id = a.dynasty_id
ORDER BY r.score DESC, d.id
LIMIT ?2";

const STANDARD_LINES: &str = "
WITH ranked AS MATERIALIZED (
  SELECT rowid AS id, -bm25(lines_standard) AS score
  FROM lines_standard
  WHERE lines_standard MATCH ?1
)
SELECT l.id, l.document_id, l.content, r.score
FROM ranked r
JOIN lines l ON l.id = r.id
ORDER BY r.score DESC, l.id
LIMIT ?2";

/// FTS5 over text segmented with a [`TextProfile`]; every query token must
/// be present.
#[derive(Clone)]
pub struct StandardEngine {
  conn:    tokio_rusqlite::Connection,
  profile: TextProfile,
}

impl StandardEngine {
  pub fn new(conn: tokio_rusqlite::Connection, profile: TextProfile) -> Self {
    Self { conn, profile }
  }

  pub fn profile(&self) -> TextProfile { self.profile }

  async fn run(&self, table: ContentTable, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    if is_blank(query) || limit == 0 {
      return Ok(Vec::new());
    }
    let tokens = segment_query(self.profile, query);
    if tokens.is_empty() {
      return Ok(Vec::new());
    }
    let expr = fts_expression(&tokens);
    let index = spec(table).standard;
    let limit_val = limit as i64;

    let hits = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, index)? {
          return Ok(None);
        }
        let hits = match table {
          ContentTable::Document => query_documents(
            conn,
            STANDARD_DOCUMENTS,
            rusqlite::params![expr, limit_val],
            |r| r.get(5),
          )?,
          ContentTable::Line => {
            query_lines(conn, STANDARD_LINES, rusqlite::params![expr, limit_val], |r| r.get(3))?
          }
        };
        Ok(Some(hits))
      })
      .await?;

    hits.ok_or_else(|| missing_family(table, EngineChoice::Standard))
  }
}

impl LexicalEngine for StandardEngine {
  type Error = Error;

  fn choice(&self) -> EngineChoice { EngineChoice::Standard }

  async fn search(&self, table: ContentTable, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    self.run(table, query, limit).await
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// The strategy selected for a loaded configuration.
#[derive(Clone)]
pub enum SqliteEngine {
  Native(NativeEngine),
  Standard(StandardEngine),
}

impl SqliteEngine {
  pub fn for_config(conn: tokio_rusqlite::Connection, config: &SearchConfiguration) -> Self {
    match config.engine {
      EngineChoice::Native => Self::Native(NativeEngine::new(conn)),
      EngineChoice::Standard => Self::Standard(StandardEngine::new(conn, config.text_profile)),
    }
  }
}

impl LexicalEngine for SqliteEngine {
  type Error = Error;

  fn choice(&self) -> EngineChoice {
    match self {
      Self::Native(e) => e.choice(),
      Self::Standard(e) => e.choice(),
    }
  }

  async fn search(&self, table: ContentTable, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    match self {
      Self::Native(e) => e.run(table, query, limit).await,
      Self::Standard(e) => e.run(table, query, limit).await,
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// AND of quoted phrases. Double quotes inside a term are doubled.
fn fts_expression(terms: &[String]) -> String {
  terms
    .iter()
    .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
    .collect::<Vec<_>>()
    .join(" ")
}

fn missing_family(table: ContentTable, engine: EngineChoice) -> Error {
  tracing::warn!(%table, %engine, "expected index family is not live");
  shici_core::Error::IndexInconsistency { table, engine }.into()
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
  Ok(conn
    .query_row(
      "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
      [name],
      |_| Ok(()),
    )
    .optional()?
    .is_some())
}

/// Map an integer occurrence count in column `idx` to a score in `(0, 1)`.
fn occurrence_score(idx: usize) -> impl Fn(&rusqlite::Row<'_>) -> rusqlite::Result<f64> {
  move |r: &rusqlite::Row<'_>| {
    let hits: Option<i64> = r.get(idx)?;
    let h = hits.unwrap_or(0).max(0) as f64;
    Ok(h / (h + 1.0))
  }
}

/// Run a document query whose first five columns are
/// `id, title, author, dynasty, body`.
pub(crate) fn query_documents<P, F>(
  conn: &Connection,
  sql: &str,
  params: P,
  score: F,
) -> rusqlite::Result<Vec<SearchHit>>
where
  P: rusqlite::Params,
  F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<f64>,
{
  let mut stmt = conn.prepare(sql)?;
  stmt
    .query_map(params, |r| {
      Ok(SearchHit {
        row:   Row::Document(read_document(r)?),
        score: score(r)?,
        kind:  MatchKind::Lexical,
      })
    })?
    .collect()
}

/// Run a line query whose first three columns are `id, document_id, content`.
pub(crate) fn query_lines<P, F>(
  conn: &Connection,
  sql: &str,
  params: P,
  score: F,
) -> rusqlite::Result<Vec<SearchHit>>
where
  P: rusqlite::Params,
  F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<f64>,
{
  let mut stmt = conn.prepare(sql)?;
  stmt
    .query_map(params, |r| {
      Ok(SearchHit {
        row:   Row::Line(read_line(r)?),
        score: score(r)?,
        kind:  MatchKind::Lexical,
      })
    })?
    .collect()
}

pub(crate) fn read_document(r: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
  Ok(DocumentRow {
    id:      r.get(0)?,
    title:   r.get(1)?,
    author:  r.get(2)?,
    dynasty: r.get(3)?,
    body:    r.get(4)?,
  })
}

pub(crate) fn read_line(r: &rusqlite::Row<'_>) -> rusqlite::Result<LineRow> {
  Ok(LineRow {
    id:          r.get(0)?,
    document_id: r.get(1)?,
    content:     r.get(2)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fts_expression_quotes_terms() {
    let expr = fts_expression(&["明月".to_owned(), "say \"hi\"".to_owned()]);
    assert_eq!(expr, "\"明月\" \"say \"\"hi\"\"\"");
  }
}
