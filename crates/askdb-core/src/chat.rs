//! Chats and the append-only message log that belongs to each one.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Title given to chats created without one.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// The author of a message.
///
/// Only [`Role::User`] and [`Role::Assistant`] are ever persisted; `system`
/// and `tool` messages exist transiently while a question is resolved.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
  System,
  Tool,
}

impl Role {
  /// Parse a role as stored in the history table.
  pub fn parse(s: &str) -> Result<Self, Error> {
    Role::from_str(s).map_err(|_| Error::UnknownRole(s.to_owned()))
  }
}

/// A conversation owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
  pub id:         i64,
  pub user_id:    i64,
  pub title:      String,
  pub created_at: DateTime<Utc>,
}

/// A persisted message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub id:         i64,
  pub chat_id:    i64,
  pub role:       Role,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}

/// A `(role, content)` pair as replayed into the model context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
  pub role:    Role,
  pub content: String,
}

impl Turn {
  pub fn new(role: Role, content: impl Into<String>) -> Self {
    Self { role, content: content.into() }
  }
}

impl From<Message> for Turn {
  fn from(m: Message) -> Self { Turn { role: m.role, content: m.content } }
}
