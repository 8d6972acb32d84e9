//! Integration tests for `SqliteStore` against an in-memory database.

use askdb_core::{
  chat::{DEFAULT_CHAT_TITLE, Role},
  store::{ChatStore, UserStore},
  user::{NewUser, User},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, name: &str) -> User {
  s.create_user(NewUser {
    username:      name.into(),
    email:         format!("{name}@example.com"),
    password_hash: "$argon2id$v=19$placeholder".into(),
  })
  .await
  .unwrap()
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_user() {
  let s     = store().await;
  let alice = user(&s, "alice").await;

  let fetched = s.get_user(alice.id).await.unwrap().unwrap();
  assert_eq!(fetched, alice);
  assert!(s.get_user(alice.id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_or_email_is_rejected() {
  let s = store().await;
  user(&s, "alice").await;

  let same_name = s
    .create_user(NewUser {
      username:      "alice".into(),
      email:         "other@example.com".into(),
      password_hash: "x".into(),
    })
    .await;
  assert!(matches!(same_name, Err(Error::UserExists)));

  let same_email = s
    .create_user(NewUser {
      username:      "alicia".into(),
      email:         "alice@example.com".into(),
      password_hash: "x".into(),
    })
    .await;
  assert!(matches!(same_email, Err(Error::UserExists)));
}

#[tokio::test]
async fn find_credentials_returns_hash() {
  let s     = store().await;
  let alice = user(&s, "alice").await;

  let (found, hash) = s.find_credentials("alice").await.unwrap().unwrap();
  assert_eq!(found.id, alice.id);
  assert_eq!(hash, "$argon2id$v=19$placeholder");
  assert!(s.find_credentials("bob").await.unwrap().is_none());
}

// ─── Chats ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_chat_defaults_title() {
  let s     = store().await;
  let alice = user(&s, "alice").await;

  let untitled = s.create_chat(alice.id, None).await.unwrap();
  assert_eq!(untitled.title, DEFAULT_CHAT_TITLE);
  let titled = s.create_chat(alice.id, Some("Rentals".into())).await.unwrap();
  assert_eq!(titled.title, "Rentals");

  let fetched = s.get_chat(titled.id, alice.id).await.unwrap().unwrap();
  assert_eq!(fetched, titled);
}

#[tokio::test]
async fn get_chat_is_scoped_to_owner() {
  let s     = store().await;
  let alice = user(&s, "alice").await;
  let bob   = user(&s, "bob").await;

  let chat = s.create_chat(alice.id, None).await.unwrap();
  assert!(s.get_chat(chat.id, bob.id).await.unwrap().is_none());
}

#[tokio::test]
async fn list_chats_newest_first() {
  let s     = store().await;
  let alice = user(&s, "alice").await;

  let first  = s.create_chat(alice.id, Some("first".into())).await.unwrap();
  let second = s.create_chat(alice.id, Some("second".into())).await.unwrap();

  let chats = s.list_chats(alice.id).await.unwrap();
  let ids: Vec<_> = chats.iter().map(|c| c.id).collect();
  assert_eq!(ids, [second.id, first.id]);
}

#[tokio::test]
async fn delete_chat_requires_owner_and_removes_messages() {
  let s     = store().await;
  let alice = user(&s, "alice").await;
  let bob   = user(&s, "bob").await;

  let chat = s.create_chat(alice.id, None).await.unwrap();
  s.append_message(chat.id, Role::User, "hello".into()).await.unwrap();

  assert!(!s.delete_chat(chat.id, bob.id).await.unwrap());
  assert!(s.delete_chat(chat.id, alice.id).await.unwrap());
  assert!(!s.delete_chat(chat.id, alice.id).await.unwrap());
  assert!(s.list_messages(chat.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_all_chats_leaves_other_users_untouched() {
  let s     = store().await;
  let alice = user(&s, "alice").await;
  let bob   = user(&s, "bob").await;

  for _ in 0..3 {
    s.create_chat(alice.id, None).await.unwrap();
  }
  let bobs = s.create_chat(bob.id, None).await.unwrap();

  assert_eq!(s.delete_all_chats(alice.id).await.unwrap(), 3);
  assert!(s.list_chats(alice.id).await.unwrap().is_empty());
  assert_eq!(s.list_chats(bob.id).await.unwrap(), vec![bobs]);
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn messages_come_back_in_append_order() {
  let s     = store().await;
  let alice = user(&s, "alice").await;
  let chat  = s.create_chat(alice.id, None).await.unwrap();

  s.append_message(chat.id, Role::User, "one".into()).await.unwrap();
  s.append_message(chat.id, Role::Assistant, "two".into()).await.unwrap();
  s.append_message(chat.id, Role::User, "three".into()).await.unwrap();

  let turns = s.list_messages(chat.id).await.unwrap();
  let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
  assert_eq!(contents, ["one", "two", "three"]);
  assert_eq!(turns[1].role, Role::Assistant);
}

#[tokio::test]
async fn append_exchange_writes_user_then_assistant() {
  let s     = store().await;
  let alice = user(&s, "alice").await;
  let chat  = s.create_chat(alice.id, None).await.unwrap();

  let (q, a) = s
    .append_exchange(chat.id, "how many films?".into(), "1000.".into())
    .await
    .unwrap();
  assert!(q.id < a.id);

  let messages = s.list_chat_messages(chat.id, alice.id).await.unwrap();
  assert_eq!(messages, vec![q, a]);
  assert_eq!(messages[0].role, Role::User);
  assert_eq!(messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn append_exchange_to_missing_chat_writes_nothing() {
  let s     = store().await;
  let alice = user(&s, "alice").await;
  let chat  = s.create_chat(alice.id, None).await.unwrap();

  let result = s.append_exchange(chat.id + 1, "q".into(), "a".into()).await;
  assert!(matches!(result, Err(Error::Database(_))));
  assert!(s.list_messages(chat.id + 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_chat_messages_hides_other_users_chats() {
  let s     = store().await;
  let alice = user(&s, "alice").await;
  let bob   = user(&s, "bob").await;
  let chat  = s.create_chat(alice.id, None).await.unwrap();
  s.append_message(chat.id, Role::User, "private".into()).await.unwrap();

  assert!(s.list_chat_messages(chat.id, bob.id).await.unwrap().is_empty());
  assert_eq!(s.list_chat_messages(chat.id, alice.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn roles_are_stored_lowercase() {
  let s     = store().await;
  let alice = user(&s, "alice").await;
  let chat  = s.create_chat(alice.id, None).await.unwrap();
  s.append_exchange(chat.id, "q".into(), "a".into()).await.unwrap();

  let stored: Vec<String> = s
    .conn
    .call(|conn| {
      let mut stmt = conn.prepare("SELECT role FROM messages ORDER BY id")?;
      let roles = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
      Ok(roles)
    })
    .await
    .unwrap();
  assert_eq!(stored, ["user", "assistant"]);
}
