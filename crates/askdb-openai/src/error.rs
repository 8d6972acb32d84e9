//! Error type for `askdb-openai`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("request to language model failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The API answered with a non-success status.
  #[error("language model API returned {status}: {body}")]
  Api { status: u16, body: String },

  #[error("unreadable language model response: {0}")]
  Json(#[from] serde_json::Error),

  #[error("language model response had no choices")]
  EmptyChoices,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
