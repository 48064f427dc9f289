//! Composition of lexical and fuzzy results.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::content::SearchHit;

/// When the fuzzy matcher is consulted to top up a lexical result list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergePolicy {
  /// Lexical results are returned as-is once they fill at least
  /// `ceil(limit * supplement_ratio)` slots.
  pub supplement_ratio: f64,
}

impl Default for MergePolicy {
  fn default() -> Self { Self { supplement_ratio: 0.5 } }
}

impl MergePolicy {
  /// Number of lexical hits that makes fuzzy supplementation unnecessary.
  ///
  /// A NaN ratio behaves like the default.
  pub fn sufficient(&self, limit: usize) -> usize {
    let ratio = if self.supplement_ratio.is_nan() {
      Self::default().supplement_ratio
    } else {
      self.supplement_ratio.clamp(0.0, 1.0)
    };
    (limit as f64 * ratio).ceil() as usize
  }

  pub fn needs_supplement(&self, lexical_count: usize, limit: usize) -> bool {
    lexical_count < self.sufficient(limit)
  }
}

/// Concatenate `lexical` then `fuzzy`, dropping any fuzzy hit whose row
/// already appeared, and cap the result at `limit`.
///
/// Relative order within each list is preserved.
pub fn merge_hits(lexical: Vec<SearchHit>, fuzzy: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
  let mut seen = HashSet::new();
  lexical
    .into_iter()
    .chain(fuzzy)
    .filter(|hit| seen.insert(hit.row.key()))
    .take(limit)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::content::{LineRow, MatchKind, Row};

  fn hit(id: i64, score: f64, kind: MatchKind) -> SearchHit {
    SearchHit {
      row: Row::Line(LineRow { id, document_id: 1, content: format!("line {id}") }),
      score,
      kind,
    }
  }

  #[test]
  fn sufficient_rounds_up() {
    let policy = MergePolicy::default();
    assert_eq!(policy.sufficient(10), 5);
    assert_eq!(policy.sufficient(5), 3);
    assert_eq!(policy.sufficient(4), 2);
    assert_eq!(policy.sufficient(0), 0);
    assert!(policy.needs_supplement(1, 4));
    assert!(!policy.needs_supplement(2, 4));
  }

  #[test]
  fn ratio_is_configurable() {
    let always = MergePolicy { supplement_ratio: 1.0 };
    assert!(always.needs_supplement(9, 10));
    let never = MergePolicy { supplement_ratio: 0.0 };
    assert!(!never.needs_supplement(0, 10));
  }

  #[test]
  fn nan_ratio_behaves_like_default() {
    let policy = MergePolicy { supplement_ratio: f64::NAN };
    assert_eq!(policy.sufficient(4), MergePolicy::default().sufficient(4));
    assert!(policy.needs_supplement(1, 4));

    let above = MergePolicy { supplement_ratio: f64::INFINITY };
    assert_eq!(above.sufficient(4), 4);
  }

  #[test]
  fn lexical_entry_wins_on_duplicate() {
    let merged = merge_hits(
      vec![hit(1, 5.0, MatchKind::Lexical)],
      vec![hit(2, 0.9, MatchKind::Fuzzy), hit(1, 0.8, MatchKind::Fuzzy)],
      10,
    );
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].row.id(), 1);
    assert_eq!(merged[0].kind, MatchKind::Lexical);
    assert_eq!(merged[0].score, 5.0);
    assert_eq!(merged[1].row.id(), 2);
  }

  #[test]
  fn order_is_preserved_and_bounded() {
    let merged = merge_hits(
      vec![hit(3, 2.0, MatchKind::Lexical), hit(1, 1.0, MatchKind::Lexical)],
      vec![hit(7, 0.9, MatchKind::Fuzzy), hit(5, 0.4, MatchKind::Fuzzy)],
      3,
    );
    let ids: Vec<i64> = merged.iter().map(|h| h.row.id()).collect();
    assert_eq!(ids, vec![3, 1, 7]);
  }

  #[test]
  fn no_duplicates_for_any_overlap() {
    for limit in 0..6 {
      let lexical: Vec<_> = (0..3).map(|i| hit(i, 3.0 - i as f64, MatchKind::Lexical)).collect();
      let fuzzy: Vec<_> = (1..5).map(|i| hit(i, 1.0 / (i + 1) as f64, MatchKind::Fuzzy)).collect();
      let merged = merge_hits(lexical, fuzzy, limit);
      assert!(merged.len() <= limit);
      let keys: HashSet<_> = merged.iter().map(|h| h.row.key()).collect();
      assert_eq!(keys.len(), merged.len());
    }
  }
}
