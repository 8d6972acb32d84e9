//! Router tests: real in-memory SQLite store and target database, scripted
//! language model, requests driven through `tower::ServiceExt::oneshot`.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use askdb_core::{
  database::QueryExecutor,
  event::{DataLine, DataLineDecoder, QueryEvent},
  model::{AssistantMessage, CompletionRequest, LanguageModel, TokenStream, ToolCall, ToolChoice},
  tool::ASK_DATABASE,
};
use askdb_store_sqlite::{QueryLimits, SqliteDatabase, SqliteStore};
use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use futures::StreamExt as _;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use super::*;

// ─── Fixture ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("model unavailable")]
struct ModelDown;

/// Always asks for `sql`, then explains with `tokens`.
struct ScriptedModel {
  sql:    String,
  tokens: Vec<&'static str>,
  calls:  AtomicUsize,
}

impl ScriptedModel {
  fn asking(sql: &str) -> Self {
    Self { sql: sql.to_string(), tokens: vec!["There are ", "3 films."], calls: AtomicUsize::new(0) }
  }
}

impl LanguageModel for ScriptedModel {
  type Error = ModelDown;

  async fn complete(&self, request: CompletionRequest) -> Result<AssistantMessage, ModelDown> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if matches!(request.tool_choice, ToolChoice::Forced(_)) {
      let args = json!({ "query": self.sql }).to_string();
      Ok(AssistantMessage {
        content:    None,
        tool_calls: vec![ToolCall::function("call_1", ASK_DATABASE, args)],
      })
    } else {
      Ok(AssistantMessage { content: Some(self.tokens.concat()), tool_calls: Vec::new() })
    }
  }

  async fn complete_stream(
    &self,
    _request: CompletionRequest,
  ) -> Result<TokenStream<ModelDown>, ModelDown> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let tokens: Vec<Result<String, ModelDown>> =
      self.tokens.iter().map(|t| Ok(t.to_string())).collect();
    Ok(futures::stream::iter(tokens).boxed())
  }
}

struct TestApp {
  app:   Router,
  model: Arc<ScriptedModel>,
}

async fn make_app(model: ScriptedModel) -> TestApp {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let database = SqliteDatabase::open_in_memory(QueryLimits::default()).await.unwrap();
  for sql in [
    "CREATE TABLE film (film_id INTEGER PRIMARY KEY, title TEXT NOT NULL)",
    "INSERT INTO film (title) VALUES ('Academy Dinosaur'), ('Ace Goldfinger'), ('Adaptation Holes')",
  ] {
    database.execute(sql).await.unwrap();
  }

  let config = ServerConfig {
    jwt_secret: "test-secret".to_string(),
    event_pause_ms: 0,
    ..ServerConfig::default()
  };
  let model = Arc::new(model);
  let resolver = config.resolver(askdb_resolver::DEFAULT_SYSTEM_PROMPT.to_string());
  let state = AppState::new(
    Arc::new(store),
    Arc::new(database),
    Arc::clone(&model),
    resolver,
    config,
  );
  TestApp { app: router(state), model }
}

impl TestApp {
  async fn send(&self, req: Request<Body>) -> Response { self.app.clone().oneshot(req).await.unwrap() }

  async fn json(
    &self,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let res = self.send(req).await;
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
  }

  async fn login(&self, username: &str, password: &str) -> Response {
    let req = Request::builder()
      .method("POST")
      .uri("/api/v1/auth/login")
      .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
      .body(Body::from(format!("username={username}&password={password}")))
      .unwrap();
    self.send(req).await
  }

  /// Sign up and log in; returns the bearer token.
  async fn user(&self, username: &str) -> String {
    let (status, _) = self
      .json(
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({
          "username": username,
          "email": format!("{username}@example.com"),
          "password": "secret",
        })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED);

    let res = self.login(username, "secret").await;
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
  }

  async fn new_chat(&self, token: &str, title: Option<&str>) -> i64 {
    let (status, chat) =
      self.json("POST", "/api/v1/chats", Some(token), Some(json!({ "title": title }))).await;
    assert_eq!(status, StatusCode::CREATED);
    chat["id"].as_i64().unwrap()
  }

  /// POST /query and decode every event frame of the response.
  async fn stream(&self, token: &str, chat_id: i64, question: &str) -> (Response<()>, Vec<QueryEvent>) {
    let req = Request::builder()
      .method("POST")
      .uri("/api/v1/query")
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json!({ "question": question, "chat_id": chat_id }).to_string()))
      .unwrap();
    let res = self.send(req).await;
    let (parts, body) = res.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    let mut decoder = DataLineDecoder::new();
    let events: Vec<QueryEvent> = decoder
      .push(&bytes)
      .into_iter()
      .chain(decoder.finish())
      .filter_map(|line| match line {
        DataLine::Payload(json) => Some(serde_json::from_str(&json).unwrap()),
        DataLine::Done => None,
      })
      .collect();
    (Response::from_parts(parts, ()), events)
  }
}

// ─── Schema ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_is_public() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  let (status, body) = t.json("GET", "/api/v1/schema", None, None).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["schema"][0]["table_name"], "film");
  assert_eq!(body["schema"][0]["columns"][1], json!({ "name": "title", "type": "TEXT" }));
}

// ─── Identity ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn signup_login_and_me() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  let token = t.user("alice").await;

  let (status, me) = t.json("GET", "/api/v1/auth/me", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["username"], "alice");
  assert_eq!(me["email"], "alice@example.com");
  assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_signup_is_conflict() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  t.user("alice").await;

  let (status, body) = t
    .json(
      "POST",
      "/api/v1/auth/signup",
      None,
      Some(json!({ "username": "alice", "email": "other@example.com", "password": "x" })),
    )
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["error"], "Username or email already registered");
}

#[tokio::test]
async fn signup_rejects_invalid_email() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  let (status, _) = t
    .json(
      "POST",
      "/api/v1/auth/signup",
      None,
      Some(json!({ "username": "bob", "email": "not-an-email", "password": "x" })),
    )
    .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn wrong_password_is_unauthenticated() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  t.user("alice").await;

  let res = t.login("alice", "wrong").await;
  assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");

  let res = t.login("nobody", "secret").await;
  assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;

  let (status, _) = t.json("GET", "/api/v1/chats", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = t.json("GET", "/api/v1/chats", Some("not.a.token"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = t
    .json("POST", "/api/v1/query", None, Some(json!({ "question": "q", "chat_id": 1 })))
    .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Chats ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_lifecycle() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  let token = t.user("alice").await;

  let first = t.new_chat(&token, Some("Films")).await;
  let second = t.new_chat(&token, None).await;

  let (status, chats) = t.json("GET", "/api/v1/chats", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  let chats = chats.as_array().unwrap();
  assert_eq!(chats.len(), 2);
  assert_eq!(chats[0]["id"], second);
  assert_eq!(chats[0]["title"], "New Chat");
  assert_eq!(chats[1]["title"], "Films");

  let (status, body) =
    t.json("DELETE", &format!("/api/v1/chats/{first}"), Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "Chat deleted successfully");

  let (status, _) = t.json("DELETE", &format!("/api/v1/chats/{first}"), Some(&token), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn other_users_chats_are_not_found() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  let alice = t.user("alice").await;
  let bob = t.user("bob").await;
  let chat = t.new_chat(&alice, None).await;

  let uri = format!("/api/v1/chats/{chat}/messages");
  let (status, _) = t.json("GET", &uri, Some(&bob), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = t.json("DELETE", &format!("/api/v1/chats/{chat}"), Some(&bob), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = t
    .json("POST", "/api/v1/query/complete", Some(&bob), Some(json!({ "question": "q", "chat_id": chat })))
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(t.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn delete_all_chats_only_touches_the_caller() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  let alice = t.user("alice").await;
  let bob = t.user("bob").await;
  for _ in 0..3 {
    t.new_chat(&alice, None).await;
  }
  t.new_chat(&bob, None).await;

  let (status, body) = t.json("DELETE", "/api/v1/chats", Some(&alice), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "All chats deleted successfully");

  let (_, chats) = t.json("GET", "/api/v1/chats", Some(&alice), None).await;
  assert_eq!(chats, json!([]));
  let (_, chats) = t.json("GET", "/api/v1/chats", Some(&bob), None).await;
  assert_eq!(chats.as_array().unwrap().len(), 1);
}

// ─── Query ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_streams_events_and_persists_exchange() {
  let t = make_app(ScriptedModel::asking("SELECT COUNT(*) AS count FROM film")).await;
  let token = t.user("alice").await;
  let chat = t.new_chat(&token, None).await;

  let (res, events) = t.stream(&token, chat, "how many films are there?").await;
  assert_eq!(res.status(), StatusCode::OK);
  assert!(
    res.headers()[header::CONTENT_TYPE]
      .to_str()
      .unwrap()
      .starts_with("text/event-stream")
  );
  assert_eq!(events, vec![
    QueryEvent::Sql("SELECT COUNT(*) AS count FROM film".into()),
    QueryEvent::Results(r#"[{"count":3}]"#.into()),
    QueryEvent::Token("There are ".into()),
    QueryEvent::Token("3 films.".into()),
    QueryEvent::End,
  ]);

  let uri = format!("/api/v1/chats/{chat}/messages");
  let (status, messages) = t.json("GET", &uri, Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  let messages = messages.as_array().unwrap();
  assert_eq!(messages.len(), 2);
  assert_eq!(messages[0]["role"], "user");
  assert_eq!(messages[0]["content"], "how many films are there?");
  assert_eq!(messages[1]["role"], "assistant");
  assert_eq!(messages[1]["content"], "There are 3 films.");
}

#[tokio::test]
async fn failing_sql_streams_single_error() {
  let t = make_app(ScriptedModel::asking("SELECT * FROM films")).await;
  let token = t.user("alice").await;
  let chat = t.new_chat(&token, None).await;

  let (_, events) = t.stream(&token, chat, "q").await;
  assert_eq!(events.len(), 2);
  assert_eq!(events[0], QueryEvent::Sql("SELECT * FROM films".into()));
  assert!(matches!(&events[1], QueryEvent::Error(m) if m.contains("no such table")));

  let (_, messages) = t.json("GET", &format!("/api/v1/chats/{chat}/messages"), Some(&token), None).await;
  assert_eq!(messages, json!([]));
}

#[tokio::test]
async fn query_complete_returns_whole_resolution() {
  let t = make_app(ScriptedModel::asking("SELECT title FROM film ORDER BY film_id LIMIT 1")).await;
  let token = t.user("alice").await;
  let chat = t.new_chat(&token, None).await;

  let (status, body) = t
    .json(
      "POST",
      "/api/v1/query/complete",
      Some(&token),
      Some(json!({ "question": "first film?", "chat_id": chat })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], true);
  assert_eq!(body["sql_query"], "SELECT title FROM film ORDER BY film_id LIMIT 1");
  assert_eq!(body["query_results"], r#"[{"title":"Academy Dinosaur"}]"#);
  assert_eq!(body["explanation"], "There are 3 films.");
}

#[tokio::test]
async fn query_complete_maps_execution_failure_to_bad_request() {
  let t = make_app(ScriptedModel::asking("SELECT * FROM films")).await;
  let token = t.user("alice").await;
  let chat = t.new_chat(&token, None).await;

  let (status, body) = t
    .json("POST", "/api/v1/query/complete", Some(&token), Some(json!({ "question": "q", "chat_id": chat })))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().starts_with("Query failed"));
}

#[tokio::test]
async fn empty_question_is_rejected() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  let token = t.user("alice").await;
  let chat = t.new_chat(&token, None).await;

  let (status, _) = t
    .json("POST", "/api/v1/query", Some(&token), Some(json!({ "question": "  ", "chat_id": chat })))
    .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(t.model.calls.load(Ordering::SeqCst), 0);
}

// ─── Malformed requests ───────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_bodies_answer_with_json_errors() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  let token = t.user("alice").await;

  let (status, body) = t.json("POST", "/api/v1/query", Some(&token), Some(json!({}))).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["error"].as_str().is_some_and(|m| m.contains("question")), "{body}");

  let req = Request::builder()
    .method("POST")
    .uri("/api/v1/auth/signup")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let res = t.send(req).await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert!(body["error"].is_string());

  let req = Request::builder()
    .method("POST")
    .uri("/api/v1/auth/login")
    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
    .body(Body::from("username=alice"))
    .unwrap();
  let res = t.send(req).await;
  assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
  let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert!(body["error"].is_string());
  assert_eq!(t.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_numeric_chat_id_is_a_json_bad_request() {
  let t = make_app(ScriptedModel::asking("SELECT 1")).await;
  let token = t.user("alice").await;

  let (status, body) = t.json("GET", "/api/v1/chats/abc/messages", Some(&token), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());

  let (status, body) = t.json("DELETE", "/api/v1/chats/abc", Some(&token), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());
}
