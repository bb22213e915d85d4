//! Persistence backends for `learning-core`.
//!
//! [`SqliteStore`] keeps exercises and the review log in SQLite.
//! [`JsonFileStore`] keeps them in plain JSON files using the camelCase
//! wire format.

pub mod db;
pub mod error;
pub mod json;

pub use db::SqliteStore;
pub use error::{DbError, DbResult};
pub use json::JsonFileStore;
