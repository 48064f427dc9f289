//! SQLite backend for the shici search core.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Full-text search uses FTS5; the trigram
//! matcher and the standard engine's segmentation run as Rust SQL functions
//! registered on every connection.

mod encode;
mod engine;
mod functions;
mod fuzzy;
mod lifecycle;
mod schema;
mod store;
mod vector;

pub mod error;

pub use engine::{NativeEngine, SqliteEngine, StandardEngine};
pub use error::{CapabilityError, Error, Result};
pub use store::{SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;
