//! Core types and trait definitions for the shici poetry search core.
//!
//! No HTTP or database dependencies live here. The crate owns the engine
//! decision model, the text analysis shared by every backend, the
//! merge policy, and the [`service::SearchService`] that routes queries.

// Trait methods spell out `impl Future + Send`; impls use `async fn`.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod content;
pub mod embed;
pub mod error;
pub mod merge;
pub mod service;
pub mod store;
pub mod text;

pub use error::{Error, Result};
