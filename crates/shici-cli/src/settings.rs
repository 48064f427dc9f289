//! Runtime settings, layered from an optional TOML file and `SHICI_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;
use shici_core::{merge::MergePolicy, service::ServiceOptions};
use shici_store_sqlite::StoreOptions;

use crate::embedding::DashScopeConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub store_path:           PathBuf,
  /// FTS5 tokenizer the capability probe tries for the native engine.
  pub native_tokenizer:     String,
  pub similarity_threshold: f64,
  /// Share of `limit` lexical search must fill before fuzzy results are
  /// skipped.
  pub supplement_ratio:     f64,
  pub query_timeout_ms:     Option<u64>,
  pub embedding_dimension:  usize,
  pub embedding_model:      String,
  pub embedding_url:        String,
  pub embedding_api_key:    Option<String>,
}

impl Default for Settings {
  fn default() -> Self {
    let store = StoreOptions::default();
    Self {
      store_path:           PathBuf::from("shici.db"),
      native_tokenizer:     store.native_tokenizer,
      similarity_threshold: store.similarity_threshold,
      supplement_ratio:     MergePolicy::default().supplement_ratio,
      query_timeout_ms:     None,
      embedding_dimension:  store.embedding_dimension,
      embedding_model:      "text-embedding-v4".to_owned(),
      embedding_url:        "https://dashscope.aliyuncs.com/api/v1/services/embeddings/text-embedding/text-embedding"
        .to_owned(),
      embedding_api_key:    None,
    }
  }
}

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings: Self = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SHICI"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise settings")?;
    anyhow::ensure!(
      settings.supplement_ratio.is_finite(),
      "supplement_ratio must be a finite number, got {}",
      settings.supplement_ratio
    );
    Ok(settings)
  }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      native_tokenizer: self.native_tokenizer.clone(),
      similarity_threshold: self.similarity_threshold,
      embedding_dimension: self.embedding_dimension,
      ..StoreOptions::default()
    }
  }

  pub fn service_options(&self) -> ServiceOptions {
    ServiceOptions {
      merge:         MergePolicy { supplement_ratio: self.supplement_ratio },
      query_timeout: self.query_timeout_ms.map(Duration::from_millis),
    }
  }

  /// Provider settings, or `None` when no API key is configured.
  pub fn embedding(&self) -> Option<DashScopeConfig> {
    let api_key = self.embedding_api_key.clone().filter(|k| !k.is_empty())?;
    Some(DashScopeConfig {
      url: self.embedding_url.clone(),
      api_key,
      model: self.embedding_model.clone(),
      dimension: self.embedding_dimension,
      ..DashScopeConfig::default()
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let settings = Settings::load(Path::new("does-not-exist.toml")).unwrap();
    assert_eq!(settings.store_path, PathBuf::from("shici.db"));
    assert_eq!(settings.native_tokenizer, "trigram");
    assert_eq!(settings.service_options(), ServiceOptions::default());
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shici.toml");
    std::fs::write(
      &path,
      "store_path = \"/var/lib/shici.db\"\nsupplement_ratio = 0.25\nquery_timeout_ms = 800\n",
    )
    .unwrap();

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.store_path, PathBuf::from("/var/lib/shici.db"));
    let options = settings.service_options();
    assert_eq!(options.merge.supplement_ratio, 0.25);
    assert_eq!(options.query_timeout, Some(Duration::from_millis(800)));
    assert!(settings.embedding().is_none());
  }

  #[test]
  fn non_finite_ratio_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shici.toml");
    std::fs::write(&path, "supplement_ratio = nan\n").unwrap();

    assert!(Settings::load(&path).is_err());
  }
}
