//! Async HTTP client wrapping the askdb JSON API.

use std::{collections::VecDeque, time::Duration};

use anyhow::{Context, Result, anyhow};
use askdb_core::{
  chat::{Chat, Message},
  event::{DataLine, DataLineDecoder, QueryEvent},
  schema::SchemaSnapshot,
};
use futures::{StreamExt, stream::BoxStream};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};

/// Connection settings for the askdb API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  /// Bearer token from `askdb login`.
  pub token:    Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserInfo {
  pub id:       i64,
  pub username: String,
  pub email:    String,
}

#[derive(Debug, Deserialize)]
pub struct Answer {
  pub sql_query:     String,
  pub query_results: String,
  pub explanation:   String,
}

#[derive(Deserialize)]
struct TokenBody {
  access_token: String,
}

#[derive(Deserialize)]
struct SchemaBody {
  schema: SchemaSnapshot,
}

/// Async HTTP client for the askdb API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    // No overall timeout: streamed answers stay open while the model writes.
    let client = Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api/v1{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.config.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
    tracing::debug!(what, "sending request");
    let resp = self.auth(req).send().await.with_context(|| format!("{what} failed"))?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(anyhow!("{what} → {status}: {}", error_message(&body)))
  }

  // ── Identity ──────────────────────────────────────────────────────────────

  /// `POST /auth/signup`
  pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<UserInfo> {
    let body = json!({ "username": username, "email": email, "password": password });
    let req = self.client.post(self.url("/auth/signup")).json(&body);
    self.send(req, "POST /auth/signup").await?.json().await.context("deserialising user")
  }

  /// `POST /auth/login`; returns the bearer token.
  pub async fn login(&self, username: &str, password: &str) -> Result<String> {
    let req = self
      .client
      .post(self.url("/auth/login"))
      .form(&[("username", username), ("password", password)]);
    let body: TokenBody =
      self.send(req, "POST /auth/login").await?.json().await.context("deserialising token")?;
    Ok(body.access_token)
  }

  /// `GET /auth/me`
  pub async fn me(&self) -> Result<UserInfo> {
    let req = self.client.get(self.url("/auth/me"));
    self.send(req, "GET /auth/me").await?.json().await.context("deserialising user")
  }

  // ── Schema ────────────────────────────────────────────────────────────────

  /// `GET /schema`
  pub async fn schema(&self) -> Result<SchemaSnapshot> {
    let req = self.client.get(self.url("/schema"));
    let body: SchemaBody =
      self.send(req, "GET /schema").await?.json().await.context("deserialising schema")?;
    Ok(body.schema)
  }

  // ── Chats ─────────────────────────────────────────────────────────────────

  /// `GET /chats`
  pub async fn list_chats(&self) -> Result<Vec<Chat>> {
    let req = self.client.get(self.url("/chats"));
    self.send(req, "GET /chats").await?.json().await.context("deserialising chats")
  }

  /// `POST /chats`
  pub async fn create_chat(&self, title: Option<&str>) -> Result<Chat> {
    let req = self.client.post(self.url("/chats")).json(&json!({ "title": title }));
    self.send(req, "POST /chats").await?.json().await.context("deserialising chat")
  }

  /// `DELETE /chats/{id}`
  pub async fn delete_chat(&self, chat_id: i64) -> Result<()> {
    let req = self.client.delete(self.url(&format!("/chats/{chat_id}")));
    self.send(req, "DELETE /chats/{id}").await?;
    Ok(())
  }

  /// `DELETE /chats`
  pub async fn delete_all_chats(&self) -> Result<()> {
    let req = self.client.delete(self.url("/chats"));
    self.send(req, "DELETE /chats").await?;
    Ok(())
  }

  /// `GET /chats/{id}/messages`
  pub async fn messages(&self, chat_id: i64) -> Result<Vec<Message>> {
    let req = self.client.get(self.url(&format!("/chats/{chat_id}/messages")));
    self
      .send(req, "GET /chats/{id}/messages")
      .await?
      .json()
      .await
      .context("deserialising messages")
  }

  // ── Questions ─────────────────────────────────────────────────────────────

  /// `POST /query`; events are read as they arrive.
  pub async fn ask(&self, chat_id: i64, question: &str) -> Result<EventStream> {
    let req = self
      .client
      .post(self.url("/query"))
      .json(&json!({ "question": question, "chat_id": chat_id }));
    let resp = self.send(req, "POST /query").await?;
    let body = resp.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed();
    Ok(EventStream::new(body))
  }

  /// `POST /query/complete`
  pub async fn ask_complete(&self, chat_id: i64, question: &str) -> Result<Answer> {
    let req = self
      .client
      .post(self.url("/query/complete"))
      .json(&json!({ "question": question, "chat_id": chat_id }));
    self.send(req, "POST /query/complete").await?.json().await.context("deserialising answer")
  }
}

/// The `error` field of an API error body, or the body itself.
fn error_message(body: &str) -> String {
  serde_json::from_str::<Value>(body)
    .ok()
    .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
    .unwrap_or_else(|| body.trim().to_owned())
}

// ─── Event stream ─────────────────────────────────────────────────────────────

/// Incremental reader of a `POST /query` response body.
pub struct EventStream {
  body:     BoxStream<'static, reqwest::Result<Vec<u8>>>,
  decoder:  DataLineDecoder,
  pending:  VecDeque<QueryEvent>,
  finished: bool,
}

impl EventStream {
  fn new(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> Self {
    Self { body, decoder: DataLineDecoder::new(), pending: VecDeque::new(), finished: false }
  }

  /// The next event, or `None` once the server closed the stream.
  pub async fn next(&mut self) -> Result<Option<QueryEvent>> {
    loop {
      if let Some(event) = self.pending.pop_front() {
        return Ok(Some(event));
      }
      if self.finished {
        return Ok(None);
      }

      let lines = match self.body.next().await {
        Some(chunk) => self.decoder.push(&chunk.context("reading event stream")?),
        None => {
          self.finished = true;
          self.decoder.finish().into_iter().collect()
        }
      };
      for line in lines {
        if let DataLine::Payload(payload) = line {
          let event = serde_json::from_str(&payload)
            .with_context(|| format!("decoding event {payload}"))?;
          self.pending.push_back(event);
        }
      }
    }
  }
}
