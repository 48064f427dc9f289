//! SQL schema and index DDL for the shici SQLite store.
//!
//! Base tables are created once at connection startup. Search indexes are
//! owned by the lifecycle manager and built from the [`TableSpec`]
//! descriptors below, so each content table's native, standard and trigram
//! artifacts share one naming scheme.

use shici_core::{config::TextProfile, content::ContentTable};

use crate::functions::segment_function;

/// Base table DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS dynasties (
    id    INTEGER PRIMARY KEY,
    name  TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS authors (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    dynasty_id  INTEGER NOT NULL REFERENCES dynasties(id),
    UNIQUE (name, dynasty_id)
);

CREATE TABLE IF NOT EXISTS documents (
    id          INTEGER PRIMARY KEY,
    title       TEXT NOT NULL,
    author_id   INTEGER NOT NULL REFERENCES authors(id),
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

-- embedding: little-endian f32 blob, written once by ingestion.
CREATE TABLE IF NOT EXISTS lines (
    id           INTEGER PRIMARY KEY,
    document_id  INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    content      TEXT NOT NULL,
    embedding    BLOB,
    created_at   TEXT NOT NULL
);

-- Upsert-only; rows are never deleted.
CREATE TABLE IF NOT EXISTS search_config (
    key         TEXT PRIMARY KEY CHECK (key IN ('search_engine', 'text_search_config')),
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

PRAGMA user_version = 1;
";

/// Structural indexes, independent of the engine choice.
pub const BASELINE_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS authors_dynasty_idx  ON authors(dynasty_id);
CREATE INDEX IF NOT EXISTS authors_name_idx     ON authors(name);
CREATE INDEX IF NOT EXISTS documents_author_idx ON documents(author_id);
CREATE INDEX IF NOT EXISTS documents_title_idx  ON documents(title);
CREATE INDEX IF NOT EXISTS lines_document_idx   ON lines(document_id);
";

pub const BASELINE_INDEX_NAMES: [&str; 5] = [
  "authors_dynasty_idx",
  "authors_name_idx",
  "documents_author_idx",
  "documents_title_idx",
  "lines_document_idx",
];

/// Partial index over lines that carry an embedding.
pub const VECTOR_INDEX: &str =
  "CREATE INDEX IF NOT EXISTS lines_embedded_idx ON lines(id) WHERE embedding IS NOT NULL;";

pub const VECTOR_INDEX_NAME: &str = "lines_embedded_idx";

// ─── Per-table index descriptors ─────────────────────────────────────────────

/// Names and searchable columns of one content table.
pub struct TableSpec {
  pub base:        &'static str,
  pub columns:     &'static [&'static str],
  pub native:      &'static str,
  pub standard:    &'static str,
  pub trigrams:    &'static str,
  /// Owner column in the trigram posting table.
  pub trigram_key: &'static str,
}

pub const DOCUMENTS: TableSpec = TableSpec {
  base:        "documents",
  columns:     &["title", "body"],
  native:      "documents_native",
  standard:    "documents_standard",
  trigrams:    "document_trigrams",
  trigram_key: "document_id",
};

pub const LINES: TableSpec = TableSpec {
  base:        "lines",
  columns:     &["content"],
  native:      "lines_native",
  standard:    "lines_standard",
  trigrams:    "line_trigrams",
  trigram_key: "line_id",
};

pub fn spec(table: ContentTable) -> &'static TableSpec {
  match table {
    ContentTable::Document => &DOCUMENTS,
    ContentTable::Line => &LINES,
  }
}

impl TableSpec {
  fn column_list(&self) -> String { self.columns.join(", ") }

  fn prefixed(&self, prefix: &str) -> String {
    self
      .columns
      .iter()
      .map(|c| format!("{prefix}.{c}"))
      .collect::<Vec<_>>()
      .join(", ")
  }

  fn wrapped(&self, func: &str, prefix: &str) -> String {
    self
      .columns
      .iter()
      .map(|c| format!("{func}({prefix}{c})"))
      .collect::<Vec<_>>()
      .join(", ")
  }

  fn concatenated(&self, prefix: &str) -> String {
    self
      .columns
      .iter()
      .map(|c| format!("{prefix}.{c}"))
      .collect::<Vec<_>>()
      .join(" || ' ' || ")
  }

  /// Name of the insert trigger of `index`, which records how it was built.
  pub fn insert_trigger(index: &str) -> String { format!("{index}_ai") }

  /// Drop one family (`index` is `self.native` or `self.standard`).
  pub fn drop_family_ddl(index: &str) -> String {
    format!(
      "DROP TRIGGER IF EXISTS {index}_ai;
       DROP TRIGGER IF EXISTS {index}_ad;
       DROP TRIGGER IF EXISTS {index}_au;
       DROP TABLE IF EXISTS {index};"
    )
  }

  /// External-content FTS5 table over the base table, using the native
  /// tokenizer, populated and kept in sync by triggers.
  pub fn native_ddl(&self, tokenizer: &str) -> String {
    let t = self.native;
    let base = self.base;
    let cols = self.column_list();
    let new_vals = self.prefixed("new");
    let old_vals = self.prefixed("old");
    let tokenize = quote(tokenizer);
    format!(
      "CREATE VIRTUAL TABLE {t} USING fts5({cols}, content='{base}', content_rowid='id', tokenize={tokenize});
       INSERT INTO {t}({t}) VALUES ('rebuild');
       CREATE TRIGGER {t}_ai AFTER INSERT ON {base} BEGIN
         INSERT INTO {t}(rowid, {cols}) VALUES (new.id, {new_vals});
       END;
       CREATE TRIGGER {t}_ad AFTER DELETE ON {base} BEGIN
         INSERT INTO {t}({t}, rowid, {cols}) VALUES ('delete', old.id, {old_vals});
       END;
       CREATE TRIGGER {t}_au AFTER UPDATE OF {cols} ON {base} BEGIN
         INSERT INTO {t}({t}, rowid, {cols}) VALUES ('delete', old.id, {old_vals});
         INSERT INTO {t}(rowid, {cols}) VALUES (new.id, {new_vals});
       END;"
    )
  }

  /// FTS5 table holding text pre-segmented with `profile`.
  pub fn standard_ddl(&self, profile: TextProfile) -> String {
    let t = self.standard;
    let base = self.base;
    let cols = self.column_list();
    let func = segment_function(profile);
    let seeded = self.wrapped(func, "");
    let new_vals = self.wrapped(func, "new.");
    format!(
      "CREATE VIRTUAL TABLE {t} USING fts5({cols}, tokenize='unicode61');
       INSERT INTO {t}(rowid, {cols}) SELECT id, {seeded} FROM {base};
       CREATE TRIGGER {t}_ai AFTER INSERT ON {base} BEGIN
         INSERT INTO {t}(rowid, {cols}) VALUES (new.id, {new_vals});
       END;
       CREATE TRIGGER {t}_ad AFTER DELETE ON {base} BEGIN
         DELETE FROM {t} WHERE rowid = old.id;
       END;
       CREATE TRIGGER {t}_au AFTER UPDATE OF {cols} ON {base} BEGIN
         DELETE FROM {t} WHERE rowid = old.id;
         INSERT INTO {t}(rowid, {cols}) VALUES (new.id, {new_vals});
       END;"
    )
  }

  /// Trigram posting table over all searchable columns.
  pub fn trigram_ddl(&self) -> String {
    let t = self.trigrams;
    let key = self.trigram_key;
    let base = self.base;
    let seeded = self.concatenated("b");
    let new_text = self.concatenated("new");
    let cols = self.column_list();
    format!(
      "CREATE TABLE {t} (
         trigram  TEXT NOT NULL,
         {key}    INTEGER NOT NULL,
         PRIMARY KEY (trigram, {key})
       ) WITHOUT ROWID;
       CREATE INDEX {t}_owner_idx ON {t}({key});
       INSERT OR IGNORE INTO {t}(trigram, {key})
         SELECT j.value, b.id FROM {base} b, json_each(trigrams({seeded})) j;
       CREATE TRIGGER {t}_ai AFTER INSERT ON {base} BEGIN
         INSERT OR IGNORE INTO {t}(trigram, {key})
           SELECT value, new.id FROM json_each(trigrams({new_text}));
       END;
       CREATE TRIGGER {t}_ad AFTER DELETE ON {base} BEGIN
         DELETE FROM {t} WHERE {key} = old.id;
       END;
       CREATE TRIGGER {t}_au AFTER UPDATE OF {cols} ON {base} BEGIN
         DELETE FROM {t} WHERE {key} = old.id;
         INSERT OR IGNORE INTO {t}(trigram, {key})
           SELECT value, new.id FROM json_each(trigrams({new_text}));
       END;"
    )
  }
}

/// Single-quote an SQL string literal.
pub fn quote(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quoting_escapes_single_quotes() {
    assert_eq!(quote("trigram"), "'trigram'");
    assert_eq!(quote("it's"), "'it''s'");
  }

  #[test]
  fn standard_ddl_names_profile_function() {
    let ddl = DOCUMENTS.standard_ddl(TextProfile::Simple);
    assert!(ddl.contains("segment_simple(new.title), segment_simple(new.body)"));
    assert!(ddl.contains("CREATE TRIGGER documents_standard_ai"));
  }

  #[test]
  fn trigram_ddl_concatenates_columns() {
    let ddl = DOCUMENTS.trigram_ddl();
    assert!(ddl.contains("trigrams(new.title || ' ' || new.body)"));
    assert!(LINES.trigram_ddl().contains("trigrams(new.content)"));
  }
}
