//! Error type for `shici-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] shici_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl From<Error> for shici_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => shici_core::Error::Store(Box::new(other)),
    }
  }
}

/// Why the native engine could not be activated. Never leaves the probe.
#[derive(Debug, Error)]
#[error("native engine unavailable: {0}")]
pub struct CapabilityError(#[source] pub tokio_rusqlite::Error);

pub type Result<T, E = Error> = std::result::Result<T, E>;
