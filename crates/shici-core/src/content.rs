//! Content entities and the rows returned by searches.
//!
//! Documents (poems) and their lines are written by an external ingestion
//! process; from the search core's perspective they are read-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

// ─── Tables ──────────────────────────────────────────────────────────────────

/// The content tables a search can target.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentTable {
  /// Whole poems: title plus body.
  Document,
  /// Individual lines of a poem.
  Line,
}

// ─── Entities ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dynasty {
  pub id:   i64,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub id:         i64,
  pub name:       String,
  pub dynasty_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
  pub id:         i64,
  pub title:      String,
  pub author_id:  i64,
  pub body:       String,
  pub created_at: DateTime<Utc>,
  pub lines:      Vec<Line>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
  pub id:          i64,
  pub document_id: i64,
  pub content:     String,
  pub created_at:  DateTime<Utc>,
}

/// Input for ingesting a document together with its lines.
#[derive(Debug, Clone)]
pub struct NewDocument {
  pub title:     String,
  pub author_id: i64,
  pub body:      String,
  pub lines:     Vec<String>,
}

impl NewDocument {
  /// Build a document whose lines are the non-empty lines of `body`.
  pub fn from_body(title: impl Into<String>, author_id: i64, body: impl Into<String>) -> Self {
    let body = body.into();
    let lines = body
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .map(str::to_owned)
      .collect();
    Self { title: title.into(), author_id, body, lines }
  }
}

// ─── Search rows ─────────────────────────────────────────────────────────────

/// A document row joined through its author and dynasty for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRow {
  pub id:      i64,
  pub title:   String,
  pub author:  String,
  pub dynasty: String,
  pub body:    String,
}

/// A bare line row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRow {
  pub id:          i64,
  pub document_id: i64,
  pub content:     String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "lowercase")]
pub enum Row {
  Document(DocumentRow),
  Line(LineRow),
}

impl Row {
  pub fn table(&self) -> ContentTable {
    match self {
      Self::Document(_) => ContentTable::Document,
      Self::Line(_) => ContentTable::Line,
    }
  }

  pub fn id(&self) -> i64 {
    match self {
      Self::Document(d) => d.id,
      Self::Line(l) => l.id,
    }
  }

  /// Row identity used for deduplication.
  pub fn key(&self) -> (ContentTable, i64) { (self.table(), self.id()) }
}

/// How a hit was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchKind {
  Lexical,
  Fuzzy,
}

/// A row with its score. For lexical hits the score is the engine's rank
/// (higher is better); for fuzzy hits it is a similarity in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
  pub row:   Row,
  pub score: f64,
  pub kind:  MatchKind,
}

/// A vector-search candidate. `distance` is cosine distance (lower is nearer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor<R> {
  pub row:      R,
  pub distance: f64,
}

impl<R> Neighbor<R> {
  /// Cosine similarity, `1 - distance`.
  pub fn similarity(&self) -> f64 { 1.0 - self.distance }
}
