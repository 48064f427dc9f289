//! [`SearchService`]: query routing over any [`SearchStore`].
//!
//! The service holds the active [`SearchConfiguration`] together with the
//! lexical strategy selected for it. Both are swapped atomically by
//! [`SearchService::reload`]; queries in flight keep the snapshot they
//! started with.

use std::{
  future::Future,
  sync::{Arc, PoisonError, RwLock},
  time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  config::{ConfigKey, ConfigLifecycle, EngineChoice, SearchConfiguration, TextProfile},
  content::{ContentTable, DocumentRow, Neighbor, SearchHit},
  embed::{EmbeddingProvider, mean_vector},
  merge::{MergePolicy, merge_hits},
  store::{LexicalEngine, SearchStore},
  text::is_blank,
};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServiceOptions {
  pub merge:         MergePolicy,
  /// Per-path timeout for lexical and fuzzy reads. A lexical timeout counts
  /// as zero lexical hits; a fuzzy timeout returns the lexical hits alone.
  pub query_timeout: Option<Duration>,
}

// ─── Diagnostics ─────────────────────────────────────────────────────────────

/// The `{engine, text_profile, native_available}` triple plus the lifecycle
/// state, for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
  pub engine:           EngineChoice,
  pub text_profile:     TextProfile,
  pub native_available: bool,
  pub lifecycle:        ConfigLifecycle,
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

/// Probe, persist the decision, and reconcile indexes to match it.
///
/// Safe to run concurrently from several bootstrap processes: every step is
/// an upsert or a guarded create/drop, and the backend serialises
/// reconciliation.
pub async fn initialize<S: SearchStore>(store: &S) -> Result<SearchConfiguration> {
  let choice = store.probe().await;
  store
    .set_config(ConfigKey::SearchEngine, choice.as_ref())
    .await
    .map_err(Into::into)?;

  if store
    .get_config(ConfigKey::TextSearchConfig)
    .await
    .map_err(Into::into)?
    .is_none()
  {
    store
      .set_config(ConfigKey::TextSearchConfig, TextProfile::default().as_ref())
      .await
      .map_err(Into::into)?;
  }

  let config = store.load_configuration().await.map_err(Into::into)?;
  store.reconcile(config).await.map_err(Into::into)?;
  tracing::info!(engine = %config.engine, profile = %config.text_profile, "search engine initialised");
  Ok(config)
}

// ─── Service ─────────────────────────────────────────────────────────────────

struct Active<E> {
  config: SearchConfiguration,
  engine: E,
}

pub struct SearchService<S: SearchStore> {
  store:   Arc<S>,
  options: ServiceOptions,
  active:  RwLock<Arc<Active<S::Engine>>>,
}

impl<S: SearchStore> SearchService<S> {
  /// Run [`initialize`] and then serve with the resulting configuration.
  pub async fn bootstrap(store: Arc<S>, options: ServiceOptions) -> Result<Self> {
    let config = initialize(store.as_ref()).await?;
    Ok(Self::with_config(store, options, config))
  }

  /// Serve with whatever configuration is stored, without touching indexes.
  pub async fn open(store: Arc<S>, options: ServiceOptions) -> Result<Self> {
    let config = store.load_configuration().await.map_err(Into::into)?;
    let inventory = store.index_inventory().await.map_err(Into::into)?;
    if !inventory.matches(&config) {
      tracing::warn!(engine = %config.engine, "live indexes do not match stored engine; run reconcile");
    }
    Ok(Self::with_config(store, options, config))
  }

  fn with_config(store: Arc<S>, options: ServiceOptions, config: SearchConfiguration) -> Self {
    let engine = store.engine(&config);
    Self {
      store,
      options,
      active: RwLock::new(Arc::new(Active { config, engine })),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  fn active(&self) -> Arc<Active<S::Engine>> {
    self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn configuration(&self) -> SearchConfiguration { self.active().config }

  /// Re-read the config store and select the matching strategy.
  pub async fn reload(&self) -> Result<SearchConfiguration> {
    let config = self.store.load_configuration().await.map_err(Into::into)?;
    let engine = self.store.engine(&config);
    *self.active.write().unwrap_or_else(PoisonError::into_inner) =
      Arc::new(Active { config, engine });
    tracing::info!(engine = %config.engine, profile = %config.text_profile, "search configuration reloaded");
    Ok(config)
  }

  /// Operator-triggered re-probe: probe, persist, reconcile, reload.
  pub async fn reprobe(&self) -> Result<SearchConfiguration> {
    initialize(self.store.as_ref()).await?;
    self.reload().await
  }

  pub async fn diagnostics(&self) -> Result<Diagnostics> {
    let config = self.configuration();
    let native_available = self.store.probe().await == EngineChoice::Native;
    let stored = self
      .store
      .get_config(ConfigKey::SearchEngine)
      .await
      .map_err(Into::into)?
      .and_then(|v| v.trim().parse::<EngineChoice>().ok());
    let inventory = self.store.index_inventory().await.map_err(Into::into)?;
    let family_live = stored.is_some_and(|engine| {
      inventory.matches(&SearchConfiguration { engine, ..config })
    });
    Ok(Diagnostics {
      engine: config.engine,
      text_profile: config.text_profile,
      native_available,
      lifecycle: ConfigLifecycle::derive(stored, family_live),
    })
  }

  // ── Lexical / fuzzy ─────────────────────────────────────────────────────

  /// Lexical search with the active strategy.
  pub async fn search(
    &self,
    table: ContentTable,
    query: &str,
    limit: usize,
  ) -> Result<Vec<SearchHit>> {
    if is_blank(query) || limit == 0 {
      return Ok(Vec::new());
    }
    let active = self.active();
    active.engine.search(table, query, limit).await.map_err(Into::into)
  }

  pub async fn fuzzy_search(
    &self,
    table: ContentTable,
    query: &str,
    limit: usize,
  ) -> Result<Vec<SearchHit>> {
    if is_blank(query) || limit == 0 {
      return Ok(Vec::new());
    }
    self.store.fuzzy_search(table, query, limit).await.map_err(Into::into)
  }

  /// Lexical results, topped up from the fuzzy matcher when they fill fewer
  /// than the policy's share of `limit`.
  pub async fn merged_search(
    &self,
    table: ContentTable,
    query: &str,
    limit: usize,
  ) -> Result<Vec<SearchHit>> {
    if is_blank(query) || limit == 0 {
      return Ok(Vec::new());
    }
    let active = self.active();

    let lexical = self
      .bounded("lexical", table, async {
        active.engine.search(table, query, limit).await.map_err(Into::into)
      })
      .await?
      .unwrap_or_default();

    if !self.options.merge.needs_supplement(lexical.len(), limit) {
      return Ok(lexical);
    }

    let wanted = limit.saturating_sub(lexical.len());
    let fuzzy = self
      .bounded("fuzzy", table, async {
        self.store.fuzzy_search(table, query, wanted).await.map_err(Into::into)
      })
      .await?
      .unwrap_or_default();

    Ok(merge_hits(lexical, fuzzy, limit))
  }

  /// Document keyword search with paging.
  pub async fn keyword_search(
    &self,
    query: &str,
    limit: usize,
    offset: usize,
  ) -> Result<Vec<SearchHit>> {
    let hits = self
      .merged_search(ContentTable::Document, query, limit.saturating_add(offset))
      .await?;
    Ok(hits.into_iter().skip(offset).take(limit).collect())
  }

  /// Run `fut` under the configured timeout. `Ok(None)` means it timed out.
  async fn bounded<T>(
    &self,
    stage: &'static str,
    table: ContentTable,
    fut: impl Future<Output = Result<T>>,
  ) -> Result<Option<T>> {
    match self.options.query_timeout {
      None => fut.await.map(Some),
      Some(limit) => match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map(Some),
        Err(_) => {
          tracing::warn!(stage, %table, ?limit, "search path timed out; degrading");
          Ok(None)
        }
      },
    }
  }

  // ── Semantic ────────────────────────────────────────────────────────────

  /// Embed each phrase, average the vectors, and return documents ranked by
  /// their nearest line.
  ///
  /// Phrases that fail to embed are skipped; [`Error::Provider`] is returned
  /// only when none succeed.
  pub async fn semantic_search<P: EmbeddingProvider>(
    &self,
    provider: &P,
    phrases: &[String],
    limit: usize,
    offset: usize,
  ) -> Result<Vec<Neighbor<DocumentRow>>> {
    let phrases: Vec<&str> =
      phrases.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    if phrases.is_empty() || limit == 0 {
      return Ok(Vec::new());
    }

    let mut vectors = Vec::with_capacity(phrases.len());
    let mut last_failure = None;
    for phrase in &phrases {
      match provider.embed(phrase).await {
        Ok(v) => vectors.push(v),
        Err(e) => {
          tracing::warn!(phrase, error = %e, "embedding failed; skipping phrase");
          last_failure = Some(e.to_string());
        }
      }
    }

    let query = mean_vector(&vectors).ok_or_else(|| {
      Error::Provider(last_failure.unwrap_or_else(|| "no embeddings returned".to_owned()))
    })?;

    self
      .store
      .nearest_documents(&query, limit, offset)
      .await
      .map_err(Into::into)
  }
}

/// Split a comma-separated phrase list (ASCII or full-width commas).
pub fn split_phrases(raw: &str) -> Vec<String> {
  raw
    .split([',', '，'])
    .map(str::trim)
    .filter(|p| !p.is_empty())
    .map(str::to_owned)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn phrases_split_on_both_commas() {
    assert_eq!(split_phrases("明月, 乡愁，,  "), vec!["明月", "乡愁"]);
    assert!(split_phrases(" , ").is_empty());
  }
}
