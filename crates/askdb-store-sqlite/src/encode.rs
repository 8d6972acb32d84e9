//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision, so they sort lexically.

use askdb_core::{
  chat::{Chat, Message, Role},
  user::User,
};
use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `chats` row before decoding.
pub struct RawChat {
  pub id:         i64,
  pub user_id:    i64,
  pub title:      String,
  pub created_at: String,
}

impl RawChat {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawChat {
      id:         row.get(0)?,
      user_id:    row.get(1)?,
      title:      row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_chat(self) -> Result<Chat> {
    Ok(Chat {
      id:         self.id,
      user_id:    self.user_id,
      title:      self.title,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A `messages` row before decoding.
pub struct RawMessage {
  pub id:         i64,
  pub chat_id:    i64,
  pub role:       String,
  pub content:    String,
  pub created_at: String,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawMessage {
      id:         row.get(0)?,
      chat_id:    row.get(1)?,
      role:       row.get(2)?,
      content:    row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      id:         self.id,
      chat_id:    self.chat_id,
      role:       Role::parse(&self.role)?,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A `users` row (without the password hash) before decoding.
pub struct RawUser {
  pub id:         i64,
  pub username:   String,
  pub email:      String,
  pub created_at: String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawUser {
      id:         row.get(0)?,
      username:   row.get(1)?,
      email:      row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:         self.id,
      username:   self.username,
      email:      self.email,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
