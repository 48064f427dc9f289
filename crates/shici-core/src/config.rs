//! The persisted engine decision and the configuration derived from it.
//!
//! Exactly two keys live in the config store. Everything else the search
//! layer needs is derived from them when a [`SearchConfiguration`] is loaded.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// The keys of the durable config store.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ConfigKey {
  /// Which lexical engine is active.
  SearchEngine,
  /// Which text-processing profile the standard engine uses.
  TextSearchConfig,
}

// ─── Engine choice ───────────────────────────────────────────────────────────

/// The persisted decision of which lexical strategy is active.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EngineChoice {
  /// Full-text engine with built-in multilingual tokenization.
  Native,
  /// Baseline full-text engine over profile-segmented text.
  #[default]
  Standard,
}

// ─── Text profile ────────────────────────────────────────────────────────────

/// How the standard engine turns text into tokens.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TextProfile {
  /// Chinese word segmentation (jieba, search mode).
  #[default]
  Jieba,
  /// Alphanumeric words, with every ideograph as its own token.
  Simple,
}

// ─── Loaded configuration ────────────────────────────────────────────────────

/// Immutable snapshot of the config store, loaded once and passed to every
/// component that needs it. Re-read explicitly via `SearchService::reload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchConfiguration {
  pub engine:       EngineChoice,
  pub text_profile: TextProfile,
}

impl SearchConfiguration {
  /// Build a configuration from raw config-store values, falling back to the
  /// documented defaults for absent or unrecognised values.
  pub fn from_raw(engine: Option<&str>, text_profile: Option<&str>) -> Self {
    Self {
      engine:       parse_or_default(ConfigKey::SearchEngine, engine),
      text_profile: parse_or_default(ConfigKey::TextSearchConfig, text_profile),
    }
  }
}

fn parse_or_default<T>(key: ConfigKey, raw: Option<&str>) -> T
where
  T: std::str::FromStr + Default + std::fmt::Display,
{
  match raw {
    None => {
      let fallback = T::default();
      tracing::debug!(%key, %fallback, "config key absent, using default");
      fallback
    }
    Some(value) => value.trim().parse().unwrap_or_else(|_| {
      let fallback = T::default();
      tracing::warn!(%key, value, %fallback, "unrecognised config value, using default");
      fallback
    }),
  }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// Where the deployment is in the configuration lifecycle.
///
/// `Unconfigured → Probed → {NativeActive, StandardActive}`. A re-probe
/// re-enters `Probed` and may land in either terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfigLifecycle {
  Unconfigured,
  /// A decision is stored but its index family is not (yet) live.
  Probed(EngineChoice),
  NativeActive,
  StandardActive,
}

impl ConfigLifecycle {
  /// Derive the lifecycle state from the stored decision (if any) and
  /// whether that decision's index family is live.
  pub fn derive(stored: Option<EngineChoice>, family_live: bool) -> Self {
    match (stored, family_live) {
      (None, _) => Self::Unconfigured,
      (Some(choice), false) => Self::Probed(choice),
      (Some(EngineChoice::Native), true) => Self::NativeActive,
      (Some(EngineChoice::Standard), true) => Self::StandardActive,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_keys_default_to_standard_jieba() {
    let cfg = SearchConfiguration::from_raw(None, None);
    assert_eq!(cfg.engine, EngineChoice::Standard);
    assert_eq!(cfg.text_profile, TextProfile::Jieba);
  }

  #[test]
  fn unknown_engine_falls_back() {
    let cfg = SearchConfiguration::from_raw(Some("pgroonga"), Some("simple"));
    assert_eq!(cfg.engine, EngineChoice::Standard);
    assert_eq!(cfg.text_profile, TextProfile::Simple);
  }

  #[test]
  fn engine_string_forms() {
    assert_eq!(EngineChoice::Native.as_ref(), "native");
    assert_eq!(" native ".trim().parse::<EngineChoice>().unwrap(), EngineChoice::Native);
    assert_eq!(ConfigKey::TextSearchConfig.as_ref(), "text_search_config");
  }

  #[test]
  fn lifecycle_derivation() {
    assert_eq!(ConfigLifecycle::derive(None, true), ConfigLifecycle::Unconfigured);
    assert_eq!(
      ConfigLifecycle::derive(Some(EngineChoice::Native), false),
      ConfigLifecycle::Probed(EngineChoice::Native)
    );
    assert_eq!(
      ConfigLifecycle::derive(Some(EngineChoice::Standard), true),
      ConfigLifecycle::StandardActive
    );
  }
}
