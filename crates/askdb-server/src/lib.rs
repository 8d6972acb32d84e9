//! HTTP surface for askdb.
//!
//! Exposes an axum [`Router`] under `/api/v1`: identity (signup, login,
//! `me`), chat management, the public schema listing, and question
//! resolution either as a `text/event-stream` or as one JSON document.
//!
//! The history store and the target database are SQLite; the language model
//! is any [`LanguageModel`].

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use askdb_core::model::LanguageModel;
use askdb_openai::OpenAiConfig;
use askdb_resolver::{Resolver, ResolverConfig};
use askdb_store_sqlite::{QueryLimits, SqliteDatabase, SqliteStore};
use axum::{
  Router,
  http::HeaderValue,
  routing::{delete, get, post},
};
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, Any, CorsLayer},
  trace::TraceLayer,
};

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered
/// under `ASKDB_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                        String,
  pub port:                        u16,
  /// History and identity database.
  pub store_path:                  PathBuf,
  /// The database questions are asked about.
  pub target_path:                 PathBuf,
  pub target_read_only:            bool,
  pub max_rows:                    usize,
  pub statement_timeout_secs:      u64,
  pub jwt_secret:                  String,
  pub access_token_expire_minutes: i64,
  pub llm_base_url:                String,
  pub llm_api_key:                 Option<String>,
  pub llm_model:                   String,
  /// System prompt template containing `{SCHEMA}`.
  pub prompt_path:                 Option<PathBuf>,
  pub event_pause_ms:              u64,
  /// Allowed origins; `*` allows any.
  pub cors_origins:                Vec<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let llm = OpenAiConfig::default();
    let limits = QueryLimits::default();
    Self {
      host:                        "127.0.0.1".to_string(),
      port:                        8000,
      store_path:                  PathBuf::from("askdb.db"),
      target_path:                 PathBuf::from("target.db"),
      target_read_only:            true,
      max_rows:                    limits.max_rows,
      statement_timeout_secs:      limits.statement_timeout.as_secs(),
      jwt_secret:                  String::new(),
      access_token_expire_minutes: 30,
      llm_base_url:                llm.base_url,
      llm_api_key:                 None,
      llm_model:                   llm.model,
      prompt_path:                 None,
      event_pause_ms:              100,
      cors_origins:                vec!["*".to_string()],
    }
  }
}

impl ServerConfig {
  pub fn query_limits(&self) -> QueryLimits {
    QueryLimits {
      max_rows:          self.max_rows,
      statement_timeout: Duration::from_secs(self.statement_timeout_secs),
    }
  }

  pub fn llm(&self) -> OpenAiConfig {
    OpenAiConfig {
      base_url: self.llm_base_url.clone(),
      api_key:  self.llm_api_key.clone(),
      model:    self.llm_model.clone(),
    }
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      jwt_secret:     self.jwt_secret.clone(),
      token_lifetime: chrono::Duration::minutes(self.access_token_expire_minutes),
    }
  }

  /// Resolver settings around an already-loaded prompt template.
  pub fn resolver(&self, system_prompt: String) -> ResolverConfig {
    ResolverConfig {
      system_prompt,
      event_pause: Duration::from_millis(self.event_pause_ms),
      ..ResolverConfig::default()
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

pub type AppResolver<M> = Resolver<SqliteStore, SqliteDatabase, M>;

/// Shared state threaded through all axum handlers.
pub struct AppState<M> {
  pub store:    Arc<SqliteStore>,
  pub database: Arc<SqliteDatabase>,
  pub resolver: AppResolver<M>,
  pub auth:     Arc<AuthConfig>,
  pub config:   Arc<ServerConfig>,
}

impl<M> Clone for AppState<M> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      database: Arc::clone(&self.database),
      resolver: self.resolver.clone(),
      auth:     Arc::clone(&self.auth),
      config:   Arc::clone(&self.config),
    }
  }
}

impl<M: LanguageModel> AppState<M> {
  /// Wire the resolver to the shared store and database.
  pub fn new(
    store: Arc<SqliteStore>,
    database: Arc<SqliteDatabase>,
    model: Arc<M>,
    resolver: ResolverConfig,
    config: ServerConfig,
  ) -> Self {
    let resolver = Resolver::new(Arc::clone(&store), Arc::clone(&database), model, resolver);
    Self {
      store,
      database,
      resolver,
      auth: Arc::new(config.auth()),
      config: Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application [`Router`], mounted under `/api/v1`.
pub fn router<M>(state: AppState<M>) -> Router
where
  M: LanguageModel + 'static,
{
  use handlers::{auth as identity, chats, query, schema};

  let cors = cors_layer(&state.config.cors_origins);
  let api = Router::new()
    .route("/schema",               get(schema::get_schema::<M>))
    .route("/query",                post(query::stream::<M>))
    .route("/query/complete",       post(query::complete::<M>))
    .route("/chats",                get(chats::list::<M>).post(chats::create::<M>).delete(chats::delete_all::<M>))
    .route("/chats/{id}",           delete(chats::delete_one::<M>))
    .route("/chats/{id}/messages",  get(chats::messages::<M>))
    .route("/auth/signup",          post(identity::signup::<M>))
    .route("/auth/login",           post(identity::login::<M>))
    .route("/auth/me",              get(identity::me))
    .with_state(state);

  Router::new()
    .nest("/api/v1", api)
    .layer(cors)
    .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
  let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
  if origins.is_empty() || origins.iter().any(|o| o == "*") {
    return layer.allow_origin(Any);
  }
  let origins: Vec<HeaderValue> = origins
    .iter()
    .filter_map(|o| match HeaderValue::from_str(o) {
      Ok(value) => Some(value),
      Err(_) => {
        tracing::warn!(origin = %o, "ignoring invalid CORS origin");
        None
      }
    })
    .collect();
  layer.allow_origin(AllowOrigin::list(origins))
}

#[cfg(test)]
mod tests;
