//! Encoding helpers between Rust values and their SQLite column forms.
//!
//! Timestamps are RFC 3339 strings. Embeddings are little-endian `f32`
//! blobs.

use chrono::{DateTime, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Embeddings ──────────────────────────────────────────────────────────────

pub fn encode_vector(v: &[f32]) -> Vec<u8> {
  v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
  bytes
    .chunks_exact(4)
    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
    .collect()
}

/// Euclidean norm, accumulated in `f64`.
pub fn norm(v: &[f32]) -> f64 {
  v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt()
}

/// Cosine distance `1 - cos(a, b)` given the precomputed norm of `a`.
/// Zero-norm vectors are at distance 1.
pub fn cosine_distance(a: &[f32], a_norm: f64, b: &[f32]) -> f64 {
  let b_norm = norm(b);
  if a_norm == 0.0 || b_norm == 0.0 {
    return 1.0;
  }
  let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
  1.0 - dot / (a_norm * b_norm)
}
