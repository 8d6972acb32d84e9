//! Error type for `askdb-resolver`.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a question could not be resolved. Whatever the variant, nothing was
/// written to the chat history.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// The model did not produce exactly one tool call.
  #[error("Could not generate SQL: {0}")]
  SqlGeneration(String),

  /// The tool call's arguments did not carry a usable `query`.
  #[error("Could not read generated SQL: {0}")]
  SqlParse(String),

  /// The target database rejected or failed to run the SQL.
  #[error("Query failed: {0}")]
  QueryExecution(#[source] BoxError),

  #[error("language model request failed: {0}")]
  LanguageModel(#[source] BoxError),

  /// The target database or the history store could not be reached.
  #[error("infrastructure unavailable: {0}")]
  Infrastructure(#[source] BoxError),
}

impl ResolveError {
  pub(crate) fn infrastructure(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Infrastructure(Box::new(e))
  }

  pub(crate) fn language_model(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::LanguageModel(Box::new(e))
  }

  /// The follow-up call produced no text to show or persist.
  pub(crate) fn no_explanation() -> Self {
    Self::LanguageModel("model returned no explanation".into())
  }
}

impl From<askdb_core::Error> for ResolveError {
  fn from(e: askdb_core::Error) -> Self {
    use askdb_core::Error as Core;
    match e {
      Core::NoToolCall | Core::UnexpectedToolCallCount(_) => Self::SqlGeneration(e.to_string()),
      Core::MalformedToolCall(msg) => Self::SqlParse(msg),
      other => Self::SqlParse(other.to_string()),
    }
  }
}
