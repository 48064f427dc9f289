//! Rust functions exposed to SQL.
//!
//! Index triggers call these, so they must be registered on every connection
//! that writes to `documents` or `lines`.

use rusqlite::{Connection, functions::FunctionFlags};
use shici_core::{
  config::TextProfile,
  text::{segment_joined, similarity, trigrams},
};

/// SQL name of the segmentation function for `profile`.
pub fn segment_function(profile: TextProfile) -> &'static str {
  match profile {
    TextProfile::Jieba => "segment_jieba",
    TextProfile::Simple => "segment_simple",
  }
}

/// Register `segment_<profile>(text)`, `trigrams(text)` and
/// `similarity(a, b)`.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
  let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

  for profile in [TextProfile::Jieba, TextProfile::Simple] {
    conn.create_scalar_function(segment_function(profile), 1, flags, move |ctx| {
      let text: Option<String> = ctx.get(0)?;
      Ok(text.map(|t| segment_joined(profile, &t)).unwrap_or_default())
    })?;
  }

  // JSON array of the trigram set, for use with json_each().
  conn.create_scalar_function("trigrams", 1, flags, |ctx| {
    let text: Option<String> = ctx.get(0)?;
    serde_json::to_string(&trigrams(text.as_deref().unwrap_or_default()))
      .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
  })?;

  conn.create_scalar_function("similarity", 2, flags, |ctx| {
    let a: Option<String> = ctx.get(0)?;
    let b: Option<String> = ctx.get(1)?;
    Ok(match (a, b) {
      (Some(a), Some(b)) => similarity(&a, &b),
      _ => 0.0,
    })
  })?;

  Ok(())
}
