//! SQLite backends for askdb.
//!
//! [`SqliteStore`] holds users, chats and message history. [`SqliteDatabase`]
//! is the target database questions are asked about. Both wrap
//! [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;
mod target;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
pub use target::{QueryLimits, SqliteDatabase};

#[cfg(test)]
mod tests;
