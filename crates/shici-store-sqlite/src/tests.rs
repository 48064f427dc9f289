//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::HashSet, sync::Arc, time::Duration};

use shici_core::{
  config::{ConfigKey, ConfigLifecycle, EngineChoice, SearchConfiguration, TextProfile},
  content::{ContentTable, DocumentRow, LineRow, MatchKind, Neighbor, NewDocument, Row, SearchHit},
  embed::EmbeddingProvider,
  merge::MergePolicy,
  service::{SearchService, ServiceOptions, initialize},
  store::{IndexInventory, LexicalEngine, SearchStore},
};

use crate::{Error, SqliteEngine, SqliteStore, StoreOptions};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// A store whose native tokenizer is not compiled into SQLite, so the probe
/// always lands on the standard engine.
async fn standard_store() -> SqliteStore {
  SqliteStore::open_in_memory_with(StoreOptions {
    native_tokenizer: "icu zh_CN".into(),
    ..StoreOptions::default()
  })
  .await
  .expect("in-memory store")
}

async fn vector_store() -> SqliteStore {
  SqliteStore::open_in_memory_with(StoreOptions {
    embedding_dimension: 3,
    ..StoreOptions::default()
  })
  .await
  .expect("in-memory store")
}

/// Three Tang poems; only the first has "明月" anywhere.
async fn seed(s: &SqliteStore) -> Vec<i64> {
  let tang = s.add_dynasty("唐").await.unwrap();
  let li_bai = s.add_author("李白", tang.id).await.unwrap();
  let meng = s.add_author("孟浩然", tang.id).await.unwrap();
  let wang = s.add_author("王之涣", tang.id).await.unwrap();

  let mut ids = Vec::new();
  for doc in [
    NewDocument::from_body("明月", li_bai.id, "皎皎空中孤月轮\n江畔何人初见月"),
    NewDocument::from_body("春晓", meng.id, "春眠不觉晓\n处处闻啼鸟"),
    NewDocument::from_body("登鹳雀楼", wang.id, "白日依山尽\n黄河入海流"),
  ] {
    ids.push(s.add_document(doc).await.unwrap().id);
  }
  ids
}

async fn service(s: SqliteStore) -> SearchService<SqliteStore> {
  SearchService::bootstrap(Arc::new(s), ServiceOptions::default())
    .await
    .unwrap()
}

async fn set_engine(s: &SqliteStore, engine: EngineChoice) -> SearchConfiguration {
  s.set_config(ConfigKey::SearchEngine, engine.as_ref()).await.unwrap();
  let config = s.load_configuration().await.unwrap();
  s.reconcile(config).await.unwrap();
  config
}

// ─── Ingestion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn documents_read_back_with_lines() {
  let s = store().await;
  let ids = seed(&s).await;

  let doc = s.get_document(ids[1]).await.unwrap().unwrap();
  assert_eq!(doc.title, "春晓");
  let lines: Vec<_> = doc.lines.iter().map(|l| l.content.as_str()).collect();
  assert_eq!(lines, vec!["春眠不觉晓", "处处闻啼鸟"]);
  assert!(doc.lines.iter().all(|l| l.document_id == doc.id));

  assert!(s.get_document(999).await.unwrap().is_none());
}

// ─── Probe and initialisation ────────────────────────────────────────────────

#[tokio::test]
async fn probe_finds_native_tokenizer() {
  let s = store().await;
  assert_eq!(s.probe().await, EngineChoice::Native);
}

#[tokio::test]
async fn probe_falls_back_when_tokenizer_unavailable() {
  let s = standard_store().await;
  assert_eq!(s.probe().await, EngineChoice::Standard);

  let config = initialize(&s).await.unwrap();
  assert_eq!(config.engine, EngineChoice::Standard);
  assert_eq!(
    s.get_config(ConfigKey::SearchEngine).await.unwrap().as_deref(),
    Some("standard")
  );

  let inventory = s.index_inventory().await.unwrap();
  for table in [ContentTable::Document, ContentTable::Line] {
    let t = inventory.table(table);
    assert!(t.standard);
    assert!(!t.native);
    assert!(t.trigram);
  }
}

#[tokio::test]
async fn initialize_is_idempotent() {
  let s = store().await;
  seed(&s).await;

  let first = initialize(&s).await.unwrap();
  let inventory = s.index_inventory().await.unwrap();
  let second = initialize(&s).await.unwrap();

  assert_eq!(first, second);
  assert_eq!(inventory, s.index_inventory().await.unwrap());
  assert!(inventory.matches(&first));
  assert!(inventory.baseline);
}

#[tokio::test]
async fn initialize_keeps_existing_text_profile() {
  let s = standard_store().await;
  s.set_config(ConfigKey::TextSearchConfig, "simple").await.unwrap();

  let config = initialize(&s).await.unwrap();
  assert_eq!(config.text_profile, TextProfile::Simple);

  let inventory = s.index_inventory().await.unwrap();
  assert_eq!(inventory.documents.standard_profile, Some(TextProfile::Simple));
  assert_eq!(inventory.lines.standard_profile, Some(TextProfile::Simple));
}

#[tokio::test]
async fn unknown_config_values_fall_back_to_defaults() {
  let s = store().await;
  s.set_config(ConfigKey::SearchEngine, "elastic").await.unwrap();
  s.set_config(ConfigKey::TextSearchConfig, "english").await.unwrap();

  let config = s.load_configuration().await.unwrap();
  assert_eq!(config, SearchConfiguration::default());
}

#[tokio::test]
async fn concurrent_bootstraps_converge() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("shici.db");
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();
  seed(&a).await;

  let (ra, rb) = tokio::join!(initialize(&a), initialize(&b));
  let (ca, cb) = (ra.unwrap(), rb.unwrap());
  assert_eq!(ca, cb);

  let inventory = b.index_inventory().await.unwrap();
  assert!(inventory.matches(&ca));
  assert!(inventory.documents.trigram && inventory.lines.trigram);
}

// ─── Index lifecycle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn switching_engine_swaps_families_and_keeps_trigrams() {
  let s = store().await;
  seed(&s).await;

  let standard = set_engine(&s, EngineChoice::Standard).await;
  let before = s.index_inventory().await.unwrap();
  assert!(before.matches(&standard));
  let fuzzy_before = s.fuzzy_search(ContentTable::Document, "春晓", 5).await.unwrap();

  let native = set_engine(&s, EngineChoice::Native).await;
  let after = s.index_inventory().await.unwrap();
  assert!(after.matches(&native));
  for table in [ContentTable::Document, ContentTable::Line] {
    assert!(after.table(table).native);
    assert!(!after.table(table).standard);
    assert!(after.table(table).trigram);
  }
  let fuzzy_after = s.fuzzy_search(ContentTable::Document, "春晓", 5).await.unwrap();
  assert_eq!(fuzzy_before, fuzzy_after);
}

#[tokio::test]
async fn families_are_exclusive_after_every_reconcile() {
  let s = store().await;
  for engine in [EngineChoice::Native, EngineChoice::Standard, EngineChoice::Native] {
    set_engine(&s, engine).await;
    let inventory = s.index_inventory().await.unwrap();
    assert_eq!(inventory.documents.live_family(), Some(engine));
    assert_eq!(inventory.lines.live_family(), Some(engine));
  }
}

#[tokio::test]
async fn profile_change_rebuilds_standard_family() {
  let s = store().await;
  seed(&s).await;
  set_engine(&s, EngineChoice::Standard).await;
  assert_eq!(
    s.index_inventory().await.unwrap().documents.standard_profile,
    Some(TextProfile::Jieba)
  );

  s.set_config(ConfigKey::TextSearchConfig, "simple").await.unwrap();
  let config = s.load_configuration().await.unwrap();
  s.reconcile(config).await.unwrap();
  assert_eq!(
    s.index_inventory().await.unwrap().documents.standard_profile,
    Some(TextProfile::Simple)
  );

  // Single-ideograph tokens: any character of the title matches.
  let hits = s.engine(&config).search(ContentTable::Document, "鹳", 10).await.unwrap();
  assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn tokenizer_change_rebuilds_native_family() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("shici.db");

  let s = SqliteStore::open(&path).await.unwrap();
  seed(&s).await;
  let config = initialize(&s).await.unwrap();
  assert_eq!(config.engine, EngineChoice::Native);
  let hits = s.engine(&config).search(ContentTable::Line, "依山尽", 10).await.unwrap();
  assert_eq!(hits.len(), 1);

  let reopened = SqliteStore::open_with(&path, StoreOptions {
    native_tokenizer: "unicode61".into(),
    ..StoreOptions::default()
  })
  .await
  .unwrap();
  let config = initialize(&reopened).await.unwrap();
  assert_eq!(config.engine, EngineChoice::Native);

  let ddl: String = reopened
    .conn
    .call(|conn| {
      Ok(conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'documents_native'",
        [],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap();
  assert!(ddl.contains("tokenize='unicode61'"));

  // Whole-run tokens: a substring of a line no longer matches.
  let hits = reopened.engine(&config).search(ContentTable::Line, "依山尽", 10).await.unwrap();
  assert!(hits.is_empty());
  let hits = reopened.engine(&config).search(ContentTable::Line, "白日依山尽", 10).await.unwrap();
  assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn vector_index_is_optional() {
  let s = store().await;
  initialize(&s).await.unwrap();
  assert!(!s.index_inventory().await.unwrap().vector);

  s.create_vector_index().await.unwrap();
  s.create_vector_index().await.unwrap();
  assert!(s.index_inventory().await.unwrap().vector);
}

#[tokio::test]
async fn engine_without_its_family_reports_inconsistency() {
  let s = store().await;
  seed(&s).await;
  set_engine(&s, EngineChoice::Standard).await;

  let native = SearchConfiguration { engine: EngineChoice::Native, ..Default::default() };
  let err = s
    .engine(&native)
    .search(ContentTable::Document, "明月", 10)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(shici_core::Error::IndexInconsistency {
      table:  ContentTable::Document,
      engine: EngineChoice::Native,
    })
  ));
  assert!(shici_core::Error::from(err).is_retryable());
}

#[tokio::test]
async fn fuzzy_without_trigram_index_is_reported() {
  let s = store().await;
  seed(&s).await;

  let err = s.fuzzy_search(ContentTable::Line, "春眠", 5).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(shici_core::Error::FuzzyIndexMissing(ContentTable::Line))
  ));
}

// ─── Lexical search ──────────────────────────────────────────────────────────

#[tokio::test]
async fn standard_title_match() {
  let s = standard_store().await;
  let ids = seed(&s).await;
  let svc = service(s).await;
  assert_eq!(svc.configuration().engine, EngineChoice::Standard);

  let hits = svc.search(ContentTable::Document, "明月", 10).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].row.id(), ids[0]);
  assert!(hits[0].score > 0.0);
  assert_eq!(hits[0].kind, MatchKind::Lexical);
  let Row::Document(doc) = &hits[0].row else { panic!("expected a document row") };
  assert_eq!(doc.author, "李白");
  assert_eq!(doc.dynasty, "唐");
}

#[tokio::test]
async fn native_short_query_scans() {
  let s = store().await;
  let ids = seed(&s).await;
  let svc = service(s).await;
  assert_eq!(svc.configuration().engine, EngineChoice::Native);

  let hits = svc.search(ContentTable::Document, "明月", 10).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].row.id(), ids[0]);
  assert!(hits[0].score > 0.0);
}

#[tokio::test]
async fn native_long_query_uses_index() {
  let s = store().await;
  let ids = seed(&s).await;
  let svc = service(s).await;

  let hits = svc.search(ContentTable::Line, "白日依山尽", 10).await.unwrap();
  assert_eq!(hits.len(), 1);
  let Row::Line(line) = &hits[0].row else { panic!("expected a line row") };
  assert_eq!(line.document_id, ids[2]);
  assert_eq!(line.content, "白日依山尽");
}

#[tokio::test]
async fn results_are_ranked_and_bounded() {
  let s = store().await;
  seed(&s).await;
  let svc = service(s).await;

  let hits = svc.search(ContentTable::Line, "月", 10).await.unwrap();
  assert_eq!(hits.len(), 2);
  assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

  let bounded = svc.search(ContentTable::Line, "月", 1).await.unwrap();
  assert_eq!(bounded.len(), 1);
  assert_eq!(bounded[0], hits[0]);
}

#[tokio::test]
async fn blank_queries_return_nothing() {
  for s in [store().await, standard_store().await] {
    seed(&s).await;
    let svc = service(s).await;
    for table in [ContentTable::Document, ContentTable::Line] {
      for query in ["", "   ", "\t\n"] {
        assert!(svc.search(table, query, 10).await.unwrap().is_empty());
        assert!(svc.fuzzy_search(table, query, 10).await.unwrap().is_empty());
        assert!(svc.merged_search(table, query, 10).await.unwrap().is_empty());
      }
    }
  }
}

// ─── Fuzzy and merged search ─────────────────────────────────────────────────

async fn seed_latin(s: &SqliteStore) -> i64 {
  let dynasty = s.add_dynasty("现代").await.unwrap();
  let author = s.add_author("佚名", dynasty.id).await.unwrap();
  s.add_document(NewDocument::from_body("abce", author.id, "zzz"))
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn fuzzy_scores_are_similarities() {
  let s = standard_store().await;
  seed(&s).await;
  let target = seed_latin(&s).await;
  let svc = service(s).await;

  let hits = svc.fuzzy_search(ContentTable::Document, "abcd", 10).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].row.id(), target);
  assert_eq!(hits[0].kind, MatchKind::Fuzzy);
  assert!((hits[0].score - 3.0 / 7.0).abs() < 1e-9);

  let all = svc.fuzzy_search(ContentTable::Line, "春眠不觉", 10).await.unwrap();
  assert!(!all.is_empty());
  assert!(all.iter().all(|h| (0.3..=1.0).contains(&h.score)));
}

#[tokio::test]
async fn fuzzy_hits_descend_by_similarity() {
  let s = standard_store().await;
  let dynasty = s.add_dynasty("现代").await.unwrap();
  let author = s.add_author("佚名", dynasty.id).await.unwrap();
  let mut ids = Vec::new();
  for title in ["abce", "abcd", "abcde"] {
    ids.push(s.add_document(NewDocument::from_body(title, author.id, "zzz")).await.unwrap().id);
  }
  let svc = service(s).await;

  let hits = svc.fuzzy_search(ContentTable::Document, "abcd", 10).await.unwrap();
  let order: Vec<i64> = hits.iter().map(|h| h.row.id()).collect();
  assert_eq!(order, vec![ids[1], ids[2], ids[0]]);
  assert!(hits.windows(2).all(|w| w[0].score > w[1].score));
  assert_eq!(hits[0].score, 1.0);
  assert!((hits[1].score - 4.0 / 7.0).abs() < 1e-9);
}

#[tokio::test]
async fn merged_search_supplements_from_fuzzy() {
  let s = standard_store().await;
  seed(&s).await;
  let target = seed_latin(&s).await;
  let svc = service(s).await;

  assert!(svc.search(ContentTable::Document, "abcd", 4).await.unwrap().is_empty());

  let hits = svc.merged_search(ContentTable::Document, "abcd", 4).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].row.id(), target);
  assert_eq!(hits[0].kind, MatchKind::Fuzzy);
}

#[tokio::test]
async fn merged_search_skips_fuzzy_when_lexical_suffices() {
  let s = standard_store().await;
  seed(&s).await;
  let svc = service(s).await;

  let hits = svc.merged_search(ContentTable::Document, "明月", 2).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert!(hits.iter().all(|h| h.kind == MatchKind::Lexical));
}

#[tokio::test]
async fn merged_search_is_bounded_and_unique() {
  let s = store().await;
  seed(&s).await;
  let svc = SearchService::bootstrap(Arc::new(s), ServiceOptions {
    merge: MergePolicy { supplement_ratio: 1.0 },
    ..ServiceOptions::default()
  })
  .await
  .unwrap();

  for limit in [1, 2, 3, 10] {
    let hits = svc.merged_search(ContentTable::Line, "春眠不觉晓", limit).await.unwrap();
    assert!(hits.len() <= limit);
    let keys: HashSet<_> = hits.iter().map(|h| h.row.key()).collect();
    assert_eq!(keys.len(), hits.len());

    let fuzzy_from = hits.iter().position(|h| h.kind == MatchKind::Fuzzy).unwrap_or(hits.len());
    assert!(hits[..fuzzy_from].iter().all(|h| h.kind == MatchKind::Lexical));
    assert!(hits[fuzzy_from..].iter().all(|h| h.kind == MatchKind::Fuzzy));
  }
}

#[tokio::test]
async fn keyword_search_pages() {
  let s = store().await;
  seed(&s).await;
  let svc = service(s).await;

  let all = svc.keyword_search("月", 10, 0).await.unwrap();
  assert_eq!(all.len(), 1);
  assert!(svc.keyword_search("月", 10, 1).await.unwrap().is_empty());
}

// ─── Timeouts ────────────────────────────────────────────────────────────────

async fn stall() { tokio::time::sleep(Duration::from_secs(3600)).await }

#[derive(Clone)]
struct StallingEngine {
  inner: SqliteEngine,
  stall: bool,
}

impl LexicalEngine for StallingEngine {
  type Error = Error;

  fn choice(&self) -> EngineChoice { self.inner.choice() }

  async fn search(
    &self,
    table: ContentTable,
    query: &str,
    limit: usize,
  ) -> Result<Vec<SearchHit>, Error> {
    if self.stall {
      stall().await;
    }
    self.inner.search(table, query, limit).await
  }
}

/// Delegates to a `SqliteStore`, hanging the lexical or fuzzy path on demand.
struct StallingStore {
  inner:   SqliteStore,
  lexical: bool,
  fuzzy:   bool,
}

impl SearchStore for StallingStore {
  type Engine = StallingEngine;
  type Error = Error;

  async fn set_config(&self, key: ConfigKey, value: &str) -> Result<(), Error> {
    self.inner.set_config(key, value).await
  }

  async fn get_config(&self, key: ConfigKey) -> Result<Option<String>, Error> {
    self.inner.get_config(key).await
  }

  async fn probe(&self) -> EngineChoice { self.inner.probe().await }

  async fn reconcile(&self, config: SearchConfiguration) -> Result<(), Error> {
    self.inner.reconcile(config).await
  }

  async fn index_inventory(&self) -> Result<IndexInventory, Error> {
    self.inner.index_inventory().await
  }

  async fn create_vector_index(&self) -> Result<(), Error> {
    self.inner.create_vector_index().await
  }

  fn engine(&self, config: &SearchConfiguration) -> StallingEngine {
    StallingEngine { inner: self.inner.engine(config), stall: self.lexical }
  }

  async fn fuzzy_search(
    &self,
    table: ContentTable,
    query: &str,
    limit: usize,
  ) -> Result<Vec<SearchHit>, Error> {
    if self.fuzzy {
      stall().await;
    }
    self.inner.fuzzy_search(table, query, limit).await
  }

  async fn nearest_lines(
    &self,
    vector: &[f32],
    limit: usize,
  ) -> Result<Vec<Neighbor<LineRow>>, Error> {
    self.inner.nearest_lines(vector, limit).await
  }

  async fn nearest_documents(
    &self,
    vector: &[f32],
    limit: usize,
    offset: usize,
  ) -> Result<Vec<Neighbor<DocumentRow>>, Error> {
    self.inner.nearest_documents(vector, limit, offset).await
  }
}

async fn stalling_service(lexical: bool, fuzzy: bool) -> (SearchService<StallingStore>, Vec<i64>) {
  let inner = store().await;
  let ids = seed(&inner).await;
  let store = Arc::new(StallingStore { inner, lexical, fuzzy });
  let svc = SearchService::bootstrap(store, ServiceOptions {
    query_timeout: Some(Duration::from_millis(50)),
    ..ServiceOptions::default()
  })
  .await
  .unwrap();
  (svc, ids)
}

#[tokio::test]
async fn lexical_timeout_falls_through_to_fuzzy() {
  let (svc, ids) = stalling_service(true, false).await;

  let hits = svc.merged_search(ContentTable::Document, "明月", 4).await.unwrap();
  assert!(!hits.is_empty());
  assert!(hits.iter().all(|h| h.kind == MatchKind::Fuzzy));
  assert_eq!(hits[0].row.id(), ids[0]);
}

#[tokio::test]
async fn fuzzy_timeout_keeps_lexical_hits() {
  let (svc, ids) = stalling_service(false, true).await;

  // One lexical hit is short of half of 4, so the fuzzy path is consulted.
  let hits = svc.merged_search(ContentTable::Document, "明月", 4).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].row.id(), ids[0]);
  assert_eq!(hits[0].kind, MatchKind::Lexical);
}

// ─── Configuration swaps ─────────────────────────────────────────────────────

#[tokio::test]
async fn reload_switches_strategy() {
  let s = store().await;
  seed(&s).await;
  let svc = service(s).await;
  assert_eq!(svc.configuration().engine, EngineChoice::Native);

  set_engine(svc.store(), EngineChoice::Standard).await;
  let config = svc.reload().await.unwrap();
  assert_eq!(config.engine, EngineChoice::Standard);
  assert_eq!(svc.configuration(), config);

  let hits = svc.search(ContentTable::Document, "明月", 10).await.unwrap();
  assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn reprobe_restores_probed_engine() {
  let s = store().await;
  seed(&s).await;
  let svc = service(s).await;

  set_engine(svc.store(), EngineChoice::Standard).await;
  svc.reload().await.unwrap();

  let config = svc.reprobe().await.unwrap();
  assert_eq!(config.engine, EngineChoice::Native);
  assert!(svc.store().index_inventory().await.unwrap().matches(&config));
}

#[tokio::test]
async fn diagnostics_report_lifecycle() {
  let svc = service(store().await).await;
  let d = svc.diagnostics().await.unwrap();
  assert_eq!(d.engine, EngineChoice::Native);
  assert!(d.native_available);
  assert_eq!(d.lifecycle, ConfigLifecycle::NativeActive);

  let svc = service(standard_store().await).await;
  let d = svc.diagnostics().await.unwrap();
  assert_eq!(d.engine, EngineChoice::Standard);
  assert_eq!(d.text_profile, TextProfile::Jieba);
  assert!(!d.native_available);
  assert_eq!(d.lifecycle, ConfigLifecycle::StandardActive);
}

#[tokio::test]
async fn diagnostics_before_initialisation() {
  let s = Arc::new(store().await);
  let svc = SearchService::open(s, ServiceOptions::default()).await.unwrap();
  let d = svc.diagnostics().await.unwrap();
  assert_eq!(d.lifecycle, ConfigLifecycle::Unconfigured);
  assert_eq!(d.engine, EngineChoice::Standard);
}

// ─── Embeddings and vector search ────────────────────────────────────────────

/// Lines of document 0 point along x, document 1 along y, document 2 along z.
async fn seed_vectors(s: &SqliteStore) -> Vec<i64> {
  let ids = seed(s).await;
  let axes: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
  let mut line_id: i64 = 0;
  for axis in axes {
    for tilt in [0.0, 0.5] {
      line_id += 1;
      let mut v = axis;
      v[(line_id as usize) % 3] += tilt;
      s.set_line_embedding(line_id, &v).await.unwrap();
    }
  }
  ids
}

#[tokio::test]
async fn embeddings_are_write_once() {
  let s = vector_store().await;
  seed(&s).await;

  s.set_line_embedding(1, &[1.0, 0.0, 0.0]).await.unwrap();
  assert!(matches!(
    s.set_line_embedding(1, &[0.0, 1.0, 0.0]).await,
    Err(Error::Core(shici_core::Error::EmbeddingAlreadySet(1)))
  ));
  assert!(matches!(
    s.set_line_embedding(999, &[0.0, 1.0, 0.0]).await,
    Err(Error::Core(shici_core::Error::LineNotFound(999)))
  ));
  assert!(matches!(
    s.set_line_embedding(2, &[1.0, 0.0]).await,
    Err(Error::Core(shici_core::Error::DimensionMismatch { expected: 3, actual: 2 }))
  ));
}

#[tokio::test]
async fn nearest_lines_ascend_by_distance() {
  let s = vector_store().await;
  seed_vectors(&s).await;

  let hits = s.nearest_lines(&[1.0, 0.0, 0.0], 6).await.unwrap();
  assert_eq!(hits.len(), 6);
  assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
  assert_eq!(hits[0].row.id, 1);
  assert!(hits[0].distance.abs() < 1e-9);
  assert!((hits[0].similarity() - 1.0).abs() < 1e-9);

  assert_eq!(s.nearest_lines(&[1.0, 0.0, 0.0], 2).await.unwrap().len(), 2);
  assert!(s.nearest_lines(&[0.0, 0.0, 0.0], 2).await.unwrap().is_empty());
  assert!(matches!(
    s.nearest_lines(&[1.0, 0.0], 2).await,
    Err(Error::Core(shici_core::Error::DimensionMismatch { .. }))
  ));
}

#[tokio::test]
async fn nearest_documents_rank_by_closest_line() {
  let s = vector_store().await;
  let ids = seed_vectors(&s).await;

  let docs = s.nearest_documents(&[0.0, 1.0, 0.0], 3, 0).await.unwrap();
  assert_eq!(docs.len(), 3);
  assert_eq!(docs[0].row.id, ids[1]);
  assert!(docs.windows(2).all(|w| w[0].distance <= w[1].distance));

  let paged = s.nearest_documents(&[0.0, 1.0, 0.0], 1, 1).await.unwrap();
  assert_eq!(paged.len(), 1);
  assert_eq!(paged[0], docs[1]);
}

struct AxisProvider;

impl EmbeddingProvider for AxisProvider {
  type Error = std::io::Error;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, Self::Error> {
    match text {
      "月" => Ok(vec![1.0, 0.0, 0.0]),
      "鸟" => Ok(vec![0.0, 1.0, 0.0]),
      other => Err(std::io::Error::other(format!("cannot embed {other}"))),
    }
  }
}

#[tokio::test]
async fn semantic_search_averages_and_skips_failures() {
  let s = vector_store().await;
  let ids = seed_vectors(&s).await;
  let svc = service(s).await;

  let phrases = vec!["月".to_owned(), "无".to_owned()];
  let docs = svc.semantic_search(&AxisProvider, &phrases, 1, 0).await.unwrap();
  assert_eq!(docs.len(), 1);
  assert_eq!(docs[0].row.id, ids[0]);

  let both = vec!["月".to_owned(), "鸟".to_owned()];
  let docs = svc.semantic_search(&AxisProvider, &both, 3, 0).await.unwrap();
  assert_eq!(docs.len(), 3);
  assert_eq!(docs[2].row.id, ids[2]);
}

#[tokio::test]
async fn semantic_search_fails_when_no_phrase_embeds() {
  let s = vector_store().await;
  seed_vectors(&s).await;
  let svc = service(s).await;

  let err = svc
    .semantic_search(&AxisProvider, &["无".to_owned()], 3, 0)
    .await
    .unwrap_err();
  assert!(matches!(err, shici_core::Error::Provider(_)));

  assert!(svc.semantic_search(&AxisProvider, &[], 3, 0).await.unwrap().is_empty());
}
