//! API error type and [`axum::response::IntoResponse`] implementation.

use askdb_resolver::ResolveError;
use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler. Rendered as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  Unauthenticated(String),

  /// Malformed request.
  #[error("{0}")]
  BadRequest(String),

  /// Well-formed request with unacceptable values.
  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Conflict(String),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("store unavailable: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn chat_not_found() -> Self { Self::NotFound("Chat not found".to_string()) }

  pub fn invalid_credentials() -> Self {
    Self::Unauthenticated("Could not validate credentials".to_string())
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Resolve(e) => match e {
        ResolveError::SqlGeneration(_) => StatusCode::BAD_REQUEST,
        ResolveError::SqlParse(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ResolveError::QueryExecution(_) => StatusCode::BAD_REQUEST,
        ResolveError::LanguageModel(_) => StatusCode::BAD_GATEWAY,
        ResolveError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
      },
      ApiError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<askdb_store_sqlite::Error> for ApiError {
  fn from(e: askdb_store_sqlite::Error) -> Self {
    match e {
      askdb_store_sqlite::Error::UserExists => {
        ApiError::Conflict("Username or email already registered".to_string())
      }
      other => ApiError::Store(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::warn!(error = %self, "request failed");
    }
    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}
