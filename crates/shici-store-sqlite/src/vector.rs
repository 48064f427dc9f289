//! Brute-force cosine search over stored line embeddings.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension as _};
use shici_core::content::{DocumentRow, LineRow, Neighbor};

use crate::{
  Result, SqliteStore,
  encode::{cosine_distance, decode_vector, norm},
  engine::{read_document, read_line},
};

const DOCUMENT_BY_ID: &str = "
SELECT d.id, d.title, a.name, y.name, d.body
FROM documents d
JOIN authors   a ON a.id = d.author_id
JOIN dynasties y ON y.id = a.dynasty_id
WHERE d.id = ?1";

impl SqliteStore {
  fn check_dimension(&self, vector: &[f32]) -> Result<()> {
    let expected = self.options.embedding_dimension;
    if vector.len() != expected {
      return Err(shici_core::Error::DimensionMismatch { expected, actual: vector.len() }.into());
    }
    Ok(())
  }

  pub(crate) async fn vector_lines(
    &self,
    vector: &[f32],
    limit: usize,
  ) -> Result<Vec<Neighbor<LineRow>>> {
    self.check_dimension(vector)?;
    let query = vector.to_vec();
    let query_norm = norm(&query);
    if query_norm == 0.0 || limit == 0 {
      return Ok(Vec::new());
    }

    let mut scored = self
      .conn
      .call(move |conn| Ok(scan_lines(conn, &query, query_norm)?))
      .await?;
    scored.truncate(limit);

    Ok(
      scored
        .into_iter()
        .map(|(row, distance)| Neighbor { row, distance })
        .collect(),
    )
  }

  pub(crate) async fn vector_documents(
    &self,
    vector: &[f32],
    limit: usize,
    offset: usize,
  ) -> Result<Vec<Neighbor<DocumentRow>>> {
    self.check_dimension(vector)?;
    let query = vector.to_vec();
    let query_norm = norm(&query);
    if query_norm == 0.0 || limit == 0 {
      return Ok(Vec::new());
    }

    let neighbors = self
      .conn
      .call(move |conn| {
        let lines = scan_lines(conn, &query, query_norm)?;

        let mut nearest: HashMap<i64, f64> = HashMap::new();
        for (line, distance) in lines {
          nearest
            .entry(line.document_id)
            .and_modify(|d| *d = d.min(distance))
            .or_insert(distance);
        }
        let mut ranked: Vec<(i64, f64)> = nearest.into_iter().collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let mut stmt = conn.prepare(DOCUMENT_BY_ID)?;
        let mut out = Vec::new();
        for (id, distance) in ranked.into_iter().skip(offset).take(limit) {
          if let Some(row) = stmt.query_row([id], read_document).optional()? {
            out.push(Neighbor { row, distance });
          }
        }
        Ok(out)
      })
      .await?;

    tracing::debug!(count = neighbors.len(), offset, "nearest documents");
    Ok(neighbors)
  }
}

/// Every embedded line with its distance to `query`, nearest first. Lines
/// whose stored dimension differs from the query's are skipped.
fn scan_lines(
  conn: &Connection,
  query: &[f32],
  query_norm: f64,
) -> rusqlite::Result<Vec<(LineRow, f64)>> {
  let mut stmt = conn.prepare(
    "SELECT id, document_id, content, embedding FROM lines WHERE embedding IS NOT NULL",
  )?;
  let rows = stmt.query_map([], |r| Ok((read_line(r)?, r.get::<_, Vec<u8>>(3)?)))?;

  let mut scored = Vec::new();
  for row in rows {
    let (line, blob) = row?;
    let embedding = decode_vector(&blob);
    if embedding.len() != query.len() {
      continue;
    }
    scored.push((line, cosine_distance(query, query_norm, &embedding)));
  }
  scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.id.cmp(&b.0.id)));
  Ok(scored)
}
