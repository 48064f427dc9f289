//! Index lifecycle: reconciling the live index family with the stored
//! engine decision, and reporting what is live.
//!
//! Reconciliation runs in a single `BEGIN IMMEDIATE` transaction. SQLite
//! DDL is transactional, so concurrent bootstraps serialise on the write
//! lock and readers never observe a half-swapped family.

use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use shici_core::{
  config::{EngineChoice, SearchConfiguration, TextProfile},
  store::{IndexInventory, TableIndexes},
};

use crate::{
  Result, SqliteStore,
  engine::table_exists,
  functions::segment_function,
  schema::{
    BASELINE_INDEX_NAMES, BASELINE_INDEXES, DOCUMENTS, LINES, TableSpec, VECTOR_INDEX,
    VECTOR_INDEX_NAME, quote,
  },
};

impl SqliteStore {
  pub(crate) async fn reconcile_indexes(&self, config: SearchConfiguration) -> Result<()> {
    let tokenizer = self.options.native_tokenizer.clone();

    let built: Vec<&'static str> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(BASELINE_INDEXES)?;

        let mut built = Vec::new();
        for spec in [&DOCUMENTS, &LINES] {
          match config.engine {
            EngineChoice::Native => {
              tx.execute_batch(&TableSpec::drop_family_ddl(spec.standard))?;
              if !native_built_with(&tx, spec, &tokenizer)? {
                tx.execute_batch(&TableSpec::drop_family_ddl(spec.native))?;
                tx.execute_batch(&spec.native_ddl(&tokenizer))?;
                built.push(spec.native);
              }
            }
            EngineChoice::Standard => {
              tx.execute_batch(&TableSpec::drop_family_ddl(spec.native))?;
              let live = standard_profile(&tx, spec)?;
              if live != Some(config.text_profile) {
                tx.execute_batch(&TableSpec::drop_family_ddl(spec.standard))?;
                tx.execute_batch(&spec.standard_ddl(config.text_profile))?;
                built.push(spec.standard);
              }
            }
          }

          if !table_exists(&tx, spec.trigrams)? {
            tx.execute_batch(&spec.trigram_ddl())?;
            built.push(spec.trigrams);
          }
        }

        tx.commit()?;
        Ok(built)
      })
      .await?;

    tracing::info!(
      engine = %config.engine,
      profile = %config.text_profile,
      ?built,
      "indexes reconciled"
    );
    Ok(())
  }

  pub(crate) async fn inventory(&self) -> Result<IndexInventory> {
    let inventory = self
      .conn
      .call(|conn| {
        let baseline = BASELINE_INDEX_NAMES
          .iter()
          .map(|name| index_exists(conn, name))
          .collect::<rusqlite::Result<Vec<_>>>()?
          .into_iter()
          .all(|b| b);

        Ok(IndexInventory {
          documents: table_indexes(conn, &DOCUMENTS)?,
          lines: table_indexes(conn, &LINES)?,
          baseline,
          vector: index_exists(conn, VECTOR_INDEX_NAME)?,
        })
      })
      .await?;
    Ok(inventory)
  }

  pub(crate) async fn build_vector_index(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(VECTOR_INDEX)?;
        Ok(())
      })
      .await?;
    tracing::info!("vector index built");
    Ok(())
  }
}

fn table_indexes(conn: &Connection, spec: &TableSpec) -> rusqlite::Result<TableIndexes> {
  let standard = table_exists(conn, spec.standard)?;
  Ok(TableIndexes {
    native: table_exists(conn, spec.native)?,
    standard,
    standard_profile: if standard { standard_profile(conn, spec)? } else { None },
    trigram: table_exists(conn, spec.trigrams)?,
  })
}

fn index_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
  Ok(conn
    .query_row(
      "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1",
      [name],
      |_| Ok(()),
    )
    .optional()?
    .is_some())
}

/// Whether the live native family exists and was created with `tokenizer`.
fn native_built_with(conn: &Connection, spec: &TableSpec, tokenizer: &str) -> rusqlite::Result<bool> {
  let sql: Option<String> = conn
    .query_row(
      "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
      [spec.native],
      |r| r.get(0),
    )
    .optional()?;

  let clause = format!("tokenize={}", quote(tokenizer));
  Ok(sql.is_some_and(|sql| sql.contains(&clause)))
}

/// The profile the live standard family was built with, read back from the
/// segmentation function its insert trigger calls.
fn standard_profile(conn: &Connection, spec: &TableSpec) -> rusqlite::Result<Option<TextProfile>> {
  let sql: Option<String> = conn
    .query_row(
      "SELECT sql FROM sqlite_master WHERE type = 'trigger' AND name = ?1",
      [TableSpec::insert_trigger(spec.standard)],
      |r| r.get(0),
    )
    .optional()?;

  Ok(sql.and_then(|sql| {
    [TextProfile::Jieba, TextProfile::Simple]
      .into_iter()
      .find(|p| sql.contains(&format!("{}(", segment_function(*p))))
  }))
}
