//! The `ChatStore` and `UserStore` traits.
//!
//! Implemented by storage backends (e.g. `askdb-store-sqlite`). The
//! orchestrator and the server depend on these abstractions, not on any
//! concrete backend.

use std::future::Future;

use crate::{
  chat::{Chat, Message, Role, Turn},
  user::{NewUser, User},
};

/// Chats and their message history.
///
/// Messages are append-only: nothing is ever edited or reordered. Within a
/// chat they are returned oldest first.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ChatStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Chats ─────────────────────────────────────────────────────────────

  /// Create a chat for `user_id`. A missing title defaults to
  /// [`DEFAULT_CHAT_TITLE`](crate::chat::DEFAULT_CHAT_TITLE).
  fn create_chat(
    &self,
    user_id: i64,
    title: Option<String>,
  ) -> impl Future<Output = Result<Chat, Self::Error>> + Send + '_;

  /// Fetch a chat, but only if `user_id` owns it.
  fn get_chat(
    &self,
    chat_id: i64,
    user_id: i64,
  ) -> impl Future<Output = Result<Option<Chat>, Self::Error>> + Send + '_;

  /// All chats owned by `user_id`, newest first.
  fn list_chats(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<Chat>, Self::Error>> + Send + '_;

  /// Delete one chat and its messages. Returns `false` if no chat with that
  /// id belongs to `user_id`.
  fn delete_chat(
    &self,
    chat_id: i64,
    user_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every chat owned by `user_id`; returns how many were removed.
  fn delete_all_chats(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// The `(role, content)` history of a chat, oldest first.
  fn list_messages(
    &self,
    chat_id: i64,
  ) -> impl Future<Output = Result<Vec<Turn>, Self::Error>> + Send + '_;

  /// Full message records of a chat owned by `user_id`, oldest first. Empty
  /// if the chat does not exist or belongs to someone else.
  fn list_chat_messages(
    &self,
    chat_id: i64,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  /// Append a single message.
  fn append_message(
    &self,
    chat_id: i64,
    role: Role,
    content: String,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Append a question and its answer as one unit: either both rows are
  /// written, user first, or neither is.
  fn append_exchange(
    &self,
    chat_id: i64,
    question: String,
    answer: String,
  ) -> impl Future<Output = Result<(Message, Message), Self::Error>> + Send + '_;
}

/// Registered users and their credentials.
pub trait UserStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new user. Fails if the username or email is taken.
  fn create_user(
    &self,
    user: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Look a user up by username, returning it with its password hash.
  fn find_credentials<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<(User, String)>, Self::Error>> + Send + 'a;

  fn get_user(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;
}
