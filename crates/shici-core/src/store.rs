//! The `SearchStore` and `LexicalEngine` traits and supporting types.
//!
//! Storage backends (e.g. `shici-store-sqlite`) implement both traits. The
//! [`crate::service::SearchService`] depends on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  config::{ConfigKey, EngineChoice, SearchConfiguration, TextProfile},
  content::{ContentTable, DocumentRow, LineRow, Neighbor, SearchHit},
};

// ─── Index inventory ─────────────────────────────────────────────────────────

/// Which search indexes are live for one content table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableIndexes {
  pub native:           bool,
  pub standard:         bool,
  /// The profile the standard family was built with, if it is live.
  pub standard_profile: Option<TextProfile>,
  pub trigram:          bool,
}

impl TableIndexes {
  /// The single live lexical family, or `None` when zero or both are live.
  pub fn live_family(&self) -> Option<EngineChoice> {
    match (self.native, self.standard) {
      (true, false) => Some(EngineChoice::Native),
      (false, true) => Some(EngineChoice::Standard),
      _ => None,
    }
  }
}

/// Snapshot of every index artifact the lifecycle manager owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexInventory {
  pub documents: TableIndexes,
  pub lines:     TableIndexes,
  /// Structural indexes (foreign keys, name lookups).
  pub baseline:  bool,
  /// The optional index over embedded lines.
  pub vector:    bool,
}

impl IndexInventory {
  pub fn table(&self, table: ContentTable) -> &TableIndexes {
    match table {
      ContentTable::Document => &self.documents,
      ContentTable::Line => &self.lines,
    }
  }

  /// Whether `config`'s family (and, for the standard engine, its profile)
  /// is the only live family on every table.
  pub fn matches(&self, config: &SearchConfiguration) -> bool {
    [&self.documents, &self.lines].into_iter().all(|t| {
      t.live_family() == Some(config.engine)
        && (config.engine == EngineChoice::Native
          || t.standard_profile == Some(config.text_profile))
    })
  }
}

// ─── Lexical engine ──────────────────────────────────────────────────────────

/// One lexical search strategy.
///
/// Implementations return at most `limit` hits ordered by score descending.
/// A blank query yields an empty list rather than an error.
pub trait LexicalEngine: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Which engine family this strategy queries.
  fn choice(&self) -> EngineChoice;

  fn search<'a>(
    &'a self,
    table: ContentTable,
    query: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<SearchHit>, Self::Error>> + Send + 'a;
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Abstraction over a search backend: the config store, the capability
/// probe, the index lifecycle manager and the query primitives.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait SearchStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;
  type Engine: LexicalEngine<Error = Self::Error> + Clone + 'static;

  // ── Config store ────────────────────────────────────────────────────────

  /// Insert or overwrite `key`, bumping its timestamp.
  fn set_config<'a>(
    &'a self,
    key: ConfigKey,
    value: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The raw value for `key`, if one was ever written.
  fn get_config(
    &self,
    key: ConfigKey,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  /// Read both keys and apply the documented defaults.
  fn load_configuration(
    &self,
  ) -> impl Future<Output = Result<SearchConfiguration, Self::Error>> + Send + '_ {
    async move {
      let engine = self.get_config(ConfigKey::SearchEngine).await?;
      let profile = self.get_config(ConfigKey::TextSearchConfig).await?;
      Ok(SearchConfiguration::from_raw(engine.as_deref(), profile.as_deref()))
    }
  }

  // ── Capability ──────────────────────────────────────────────────────────

  /// Try to activate the native engine. Never fails: any problem resolves
  /// to [`EngineChoice::Standard`].
  fn probe(&self) -> impl Future<Output = EngineChoice> + Send + '_;

  // ── Index lifecycle ─────────────────────────────────────────────────────

  /// Make `config`'s index family the only live one and ensure the
  /// baseline and trigram indexes exist. Idempotent.
  fn reconcile(
    &self,
    config: SearchConfiguration,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn index_inventory(&self)
  -> impl Future<Output = Result<IndexInventory, Self::Error>> + Send + '_;

  /// Build the index over embedded lines. Call once bulk ingestion is done.
  fn create_vector_index(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Queries ─────────────────────────────────────────────────────────────

  /// The lexical strategy for `config`.
  fn engine(&self, config: &SearchConfiguration) -> Self::Engine;

  /// Trigram similarity search, independent of the active engine.
  fn fuzzy_search<'a>(
    &'a self,
    table: ContentTable,
    query: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<SearchHit>, Self::Error>> + Send + 'a;

  /// Lines nearest to `vector` by cosine distance, ascending.
  fn nearest_lines<'a>(
    &'a self,
    vector: &'a [f32],
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Neighbor<LineRow>>, Self::Error>> + Send + 'a;

  /// Documents ranked by the distance of their nearest line, ascending.
  fn nearest_documents<'a>(
    &'a self,
    vector: &'a [f32],
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<Vec<Neighbor<DocumentRow>>, Self::Error>> + Send + 'a;
}
