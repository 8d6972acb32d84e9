//! [`SqliteStore`]: the SQLite implementation of [`ChatStore`] and
//! [`UserStore`].

use std::path::Path;

use askdb_core::{
  chat::{Chat, DEFAULT_CHAT_TITLE, Message, Role, Turn},
  store::{ChatStore, UserStore},
  user::{NewUser, User},
};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{RawChat, RawMessage, RawUser, encode_dt, now},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Users, chats and message history backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Insert one message row and return its id.
fn insert_message(
  conn: &rusqlite::Connection,
  chat_id: i64,
  role: Role,
  content: &str,
  at: DateTime<Utc>,
) -> rusqlite::Result<i64> {
  let role: &str = role.as_ref();
  conn.execute(
    "INSERT INTO messages (chat_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![chat_id, role, content, encode_dt(at)],
  )?;
  Ok(conn.last_insert_rowid())
}

const CHAT_COLUMNS: &str = "id, user_id, title, created_at";

// ─── ChatStore impl ──────────────────────────────────────────────────────────

impl ChatStore for SqliteStore {
  type Error = Error;

  // ── Chats ─────────────────────────────────────────────────────────────────

  async fn create_chat(&self, user_id: i64, title: Option<String>) -> Result<Chat> {
    let title      = title.unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_owned());
    let created_at = now();
    let at_str     = encode_dt(created_at);
    let title_c    = title.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO chats (user_id, title, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![user_id, title_c, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Chat { id, user_id, title, created_at })
  }

  async fn get_chat(&self, chat_id: i64, user_id: i64) -> Result<Option<Chat>> {
    let raw: Option<RawChat> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1 AND user_id = ?2"),
              rusqlite::params![chat_id, user_id],
              RawChat::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawChat::into_chat).transpose()
  }

  async fn list_chats(&self, user_id: i64) -> Result<Vec<Chat>> {
    let raws: Vec<RawChat> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHAT_COLUMNS} FROM chats WHERE user_id = ?1
           ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_id], RawChat::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChat::into_chat).collect()
  }

  async fn delete_chat(&self, chat_id: i64, user_id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM chats WHERE id = ?1 AND user_id = ?2",
          rusqlite::params![chat_id, user_id],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn delete_all_chats(&self, user_id: i64) -> Result<u64> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM chats WHERE user_id = ?1",
          rusqlite::params![user_id],
        )?)
      })
      .await?;
    Ok(deleted as u64)
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn list_messages(&self, chat_id: i64) -> Result<Vec<Turn>> {
    let raws: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT role, content FROM messages WHERE chat_id = ?1
           ORDER BY created_at, id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![chat_id], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(role, content)| Ok(Turn { role: Role::parse(&role)?, content }))
      .collect()
  }

  async fn list_chat_messages(&self, chat_id: i64, user_id: i64) -> Result<Vec<Message>> {
    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT m.id, m.chat_id, m.role, m.content, m.created_at
           FROM messages m
           JOIN chats c ON m.chat_id = c.id
           WHERE c.user_id = ?1 AND m.chat_id = ?2
           ORDER BY m.created_at, m.id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id, chat_id], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn append_message(&self, chat_id: i64, role: Role, content: String) -> Result<Message> {
    let created_at = now();
    let content_c  = content.clone();

    let id = self
      .conn
      .call(move |conn| Ok(insert_message(conn, chat_id, role, &content_c, created_at)?))
      .await?;

    Ok(Message { id, chat_id, role, content, created_at })
  }

  async fn append_exchange(
    &self,
    chat_id:  i64,
    question: String,
    answer:   String,
  ) -> Result<(Message, Message)> {
    let asked_at    = now();
    let answered_at = now();
    let (q, a)      = (question.clone(), answer.clone());

    let (question_id, answer_id) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let question_id = insert_message(&tx, chat_id, Role::User, &q, asked_at)?;
        let answer_id   = insert_message(&tx, chat_id, Role::Assistant, &a, answered_at)?;
        tx.commit()?;
        Ok((question_id, answer_id))
      })
      .await?;

    Ok((
      Message {
        id: question_id,
        chat_id,
        role: Role::User,
        content: question,
        created_at: asked_at,
      },
      Message {
        id: answer_id,
        chat_id,
        role: Role::Assistant,
        content: answer,
        created_at: answered_at,
      },
    ))
  }
}

// ─── UserStore impl ──────────────────────────────────────────────────────────

impl UserStore for SqliteStore {
  type Error = Error;

  async fn create_user(&self, user: NewUser) -> Result<User> {
    let NewUser { username, email, password_hash } = user;
    let created_at = now();
    let at_str     = encode_dt(created_at);
    let (u, e)     = (username.clone(), email.clone());

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM users WHERE username = ?1 OR email = ?2",
            rusqlite::params![u, e],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO users (username, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![u, e, password_hash, at_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some(id))
      })
      .await?;

    let id = id.ok_or(Error::UserExists)?;
    Ok(User { id, username, email, created_at })
  }

  async fn find_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
    let username = username.to_owned();

    let raw: Option<(RawUser, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, username, email, created_at, password_hash
               FROM users WHERE username = ?1",
              rusqlite::params![username],
              |row| Ok((RawUser::from_row(row)?, row.get(4)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(user, hash)| Ok((user.into_user()?, hash)))
      .transpose()
  }

  async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, username, email, created_at FROM users WHERE id = ?1",
              rusqlite::params![user_id],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }
}
