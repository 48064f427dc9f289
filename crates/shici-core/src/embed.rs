//! Boundary to the external embedding-vector provider.
//!
//! The search core never computes embeddings. It consumes a provider for
//! query phrases and issues nearest-neighbour lookups against vectors the
//! ingestion pipeline has already stored.

use std::future::Future;

/// Produces a fixed-dimension vector for arbitrary text.
pub trait EmbeddingProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Embed a single piece of text.
  fn embed<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Vec<f32>, Self::Error>> + Send + 'a;
}

/// Component-wise mean of `vectors`. Vectors whose length differs from the
/// first are ignored. Returns `None` for an empty input.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
  let first = vectors.first()?;
  let dim = first.len();
  let mut sum = vec![0f64; dim];
  let mut count = 0usize;
  for v in vectors.iter().filter(|v| v.len() == dim) {
    for (acc, x) in sum.iter_mut().zip(v) {
      *acc += f64::from(*x);
    }
    count += 1;
  }
  Some(sum.into_iter().map(|s| (s / count as f64) as f32).collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mean_of_vectors() {
    let mean = mean_vector(&[vec![1.0, 3.0], vec![3.0, 5.0]]).unwrap();
    assert_eq!(mean, vec![2.0, 4.0]);
  }

  #[test]
  fn mismatched_lengths_are_ignored() {
    let mean = mean_vector(&[vec![2.0, 2.0], vec![9.0], vec![4.0, 0.0]]).unwrap();
    assert_eq!(mean, vec![3.0, 1.0]);
  }

  #[test]
  fn empty_input() {
    assert!(mean_vector(&[]).is_none());
  }
}
