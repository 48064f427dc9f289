//! Text analysis shared by every backend: profile-driven segmentation for the
//! standard engine and trigram similarity for fuzzy matching.
//!
//! Trigram extraction follows the pg_trgm rules: text is lower-cased, split
//! into words on non-alphanumeric characters, each word is padded with two
//! spaces in front and one behind, and the set of 3-character windows is
//! taken. Similarity is the Jaccard index of two trigram sets.

use std::{collections::BTreeSet, sync::LazyLock};

use jieba_rs::Jieba;

use crate::config::TextProfile;

static JIEBA: LazyLock<Jieba> = LazyLock::new(Jieba::new);

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Whether a query carries no searchable text.
pub fn is_blank(query: &str) -> bool { query.trim().is_empty() }

/// Whitespace-separated, lower-cased, de-duplicated query terms.
pub fn query_terms(query: &str) -> Vec<String> {
  let mut terms: Vec<String> = Vec::new();
  for term in query.split_whitespace().map(str::to_lowercase) {
    if !terms.contains(&term) {
      terms.push(term);
    }
  }
  terms
}

// ─── Segmentation ────────────────────────────────────────────────────────────

/// Split `text` into index tokens according to `profile`.
///
/// Tokens are lower-cased and never contain whitespace; tokens without any
/// alphanumeric character (punctuation) are dropped.
pub fn segment(profile: TextProfile, text: &str) -> Vec<String> {
  match profile {
    TextProfile::Jieba => JIEBA
      .cut_for_search(text, true)
      .into_iter()
      .map(str::trim)
      .filter(|w| w.chars().any(char::is_alphanumeric))
      .map(str::to_lowercase)
      .collect(),
    TextProfile::Simple => segment_simple(text),
  }
}

/// De-duplicated tokens of a query, in first-seen order.
pub fn segment_query(profile: TextProfile, query: &str) -> Vec<String> {
  let mut tokens: Vec<String> = Vec::new();
  for token in segment(profile, query) {
    if !tokens.contains(&token) {
      tokens.push(token);
    }
  }
  tokens
}

/// Segment and re-join with single spaces, the form stored in the standard
/// index.
pub fn segment_joined(profile: TextProfile, text: &str) -> String {
  segment(profile, text).join(" ")
}

fn segment_simple(text: &str) -> Vec<String> {
  let mut tokens = Vec::new();
  let mut word = String::new();
  for c in text.chars().flat_map(char::to_lowercase) {
    if is_ideograph(c) {
      if !word.is_empty() {
        tokens.push(std::mem::take(&mut word));
      }
      tokens.push(c.to_string());
    } else if c.is_alphanumeric() {
      word.push(c);
    } else if !word.is_empty() {
      tokens.push(std::mem::take(&mut word));
    }
  }
  if !word.is_empty() {
    tokens.push(word);
  }
  tokens
}

/// CJK unified ideographs, including extension A and the compatibility block.
pub fn is_ideograph(c: char) -> bool {
  matches!(c,
    '\u{4e00}'..='\u{9fff}' |
    '\u{3400}'..='\u{4dbf}' |
    '\u{f900}'..='\u{faff}' |
    '\u{20000}'..='\u{2a6df}'
  )
}

// ─── Trigrams ────────────────────────────────────────────────────────────────

/// The pg_trgm-style trigram set of `text`.
pub fn trigrams(text: &str) -> BTreeSet<String> {
  let lower = text.to_lowercase();
  let mut set = BTreeSet::new();
  for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
    let padded: Vec<char> = "  "
      .chars()
      .chain(word.chars())
      .chain(std::iter::once(' '))
      .collect();
    for window in padded.windows(3) {
      set.insert(window.iter().collect());
    }
  }
  set
}

/// Trigram similarity in `[0, 1]`; `0` when either side has no trigrams.
pub fn similarity(a: &str, b: &str) -> f64 {
  set_similarity(&trigrams(a), &trigrams(b))
}

/// Jaccard index of two precomputed trigram sets.
pub fn set_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
  if a.is_empty() || b.is_empty() {
    return 0.0;
  }
  let shared = a.intersection(b).count();
  let union = a.len() + b.len() - shared;
  shared as f64 / union as f64
}

/// Minimum number of shared trigrams a candidate needs before it can reach
/// `threshold` against a query with `query_len` trigrams.
pub fn min_shared_trigrams(query_len: usize, threshold: f64) -> usize {
  ((threshold * query_len as f64).ceil() as usize).max(1)
}
