//! Route handlers, one module per resource.

pub mod auth;
pub mod chats;
pub mod query;
pub mod schema;
