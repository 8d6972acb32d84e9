//! Shared vocabulary of askdb: chats and users, the schema snapshot, the
//! `ask_database` tool, language-model messages, the query event protocol,
//! and the traits each backend implements.
//!
//! No HTTP, SQL or runtime code lives here.

pub mod chat;
pub mod database;
pub mod error;
pub mod event;
pub mod model;
pub mod schema;
pub mod store;
pub mod tool;
pub mod user;

pub use error::{Error, Result};
