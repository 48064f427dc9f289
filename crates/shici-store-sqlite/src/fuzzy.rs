//! Trigram-similarity matching over the posting tables.
//!
//! Candidates are rows sharing at least `ceil(threshold · |Q|)` trigrams with
//! the query, which every row scoring at or above the threshold must do.
//! Candidates are then scored exactly with the `similarity` SQL function.

use shici_core::{
  content::{ContentTable, MatchKind, SearchHit},
  text::{is_blank, min_shared_trigrams, trigrams},
};

use crate::{
  Result, SqliteStore,
  engine::{query_documents, query_lines, table_exists},
  schema::spec,
};

const FUZZY_DOCUMENTS: &str = "
WITH candidates AS (
  SELECT document_id AS id
  FROM document_trigrams
  WHERE trigram IN (SELECT value FROM json_each(?1))
  GROUP BY document_id
  HAVING COUNT(*) >= ?2
),
scored AS (
  SELECT d.id, d.title, a.name AS author, y.name AS dynasty, d.body,
         max(similarity(?3, d.title), similarity(?3, d.body)) AS score
  FROM candidates c
  JOIN documents d ON d.id = c.id
  JOIN authors   a ON a.id = d.author_id
  JOIN dynasties y ON y.id = a.dynasty_id
)
SELECT id, title, author, dynasty, body, score
FROM scored
WHERE score >= ?4
ORDER BY score DESC, id
LIMIT ?5";

const FUZZY_LINES: &str = "
WITH candidates AS (
  SELECT line_id AS id
  FROM line_trigrams
  WHERE trigram IN (SELECT value FROM json_each(?1))
  GROUP BY line_id
  HAVING COUNT(*) >= ?2
),
scored AS (
  SELECT l.id, l.document_id, l.content, similarity(?3, l.content) AS score
  FROM candidates c
  JOIN lines l ON l.id = c.id
)
SELECT id, document_id, content, score
FROM scored
WHERE score >= ?4
ORDER BY score DESC, id
LIMIT ?5";

impl SqliteStore {
  pub(crate) async fn trigram_search(
    &self,
    table: ContentTable,
    query: &str,
    limit: usize,
  ) -> Result<Vec<SearchHit>> {
    if is_blank(query) || limit == 0 {
      return Ok(Vec::new());
    }
    let grams = trigrams(query);
    if grams.is_empty() {
      return Ok(Vec::new());
    }

    let threshold = self.options.similarity_threshold;
    let min_shared = min_shared_trigrams(grams.len(), threshold) as i64;
    let grams_json = serde_json::to_string(&grams)?;
    let query = query.to_owned();
    let index = spec(table).trigrams;
    let limit_val = limit as i64;

    let hits = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, index)? {
          return Ok(None);
        }
        let params = rusqlite::params![grams_json, min_shared, query, threshold, limit_val];
        let score = |r: &rusqlite::Row<'_>| r.get::<_, f64>("score");
        let hits = match table {
          ContentTable::Document => query_documents(conn, FUZZY_DOCUMENTS, params, score)?,
          ContentTable::Line => query_lines(conn, FUZZY_LINES, params, score)?,
        };
        Ok(Some(hits))
      })
      .await?;

    let Some(hits) = hits else {
      tracing::warn!(%table, "trigram index is not live");
      return Err(shici_core::Error::FuzzyIndexMissing(table).into());
    };

    tracing::debug!(%table, count = hits.len(), threshold, "fuzzy search");
    Ok(
      hits
        .into_iter()
        .map(|hit| SearchHit { kind: MatchKind::Fuzzy, ..hit })
        .collect(),
    )
  }
}
