//! Error types for `shici-core`.

use thiserror::Error;

use crate::{config::EngineChoice, content::ContentTable};

#[derive(Debug, Error)]
pub enum Error {
  /// The live index family does not match the stored engine decision, e.g.
  /// after a partial reconciliation. Re-running reconcile repairs it.
  #[error("search engine misconfigured: no {engine} index for {table} (re-run reconcile)")]
  IndexInconsistency {
    table:  ContentTable,
    engine: EngineChoice,
  },

  /// The trigram index is missing for a table.
  #[error("search engine misconfigured: no trigram index for {0} (re-run reconcile)")]
  FuzzyIndexMissing(ContentTable),

  /// The embedding provider failed; callers may fall back to lexical search.
  #[error("embedding provider failed: {0}")]
  Provider(String),

  #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  #[error("line {0} already has an embedding")]
  EmbeddingAlreadySet(i64),

  #[error("line not found: {0}")]
  LineNotFound(i64),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Whether the same request may succeed after operator remediation.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::IndexInconsistency { .. } | Self::FuzzyIndexMissing(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
