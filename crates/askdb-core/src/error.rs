//! Error types for `askdb-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown message role: {0:?}")]
  UnknownRole(String),

  #[error("model returned no tool call")]
  NoToolCall,

  #[error("expected exactly one tool call, model returned {0}")]
  UnexpectedToolCallCount(usize),

  #[error("malformed tool call: {0}")]
  MalformedToolCall(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
