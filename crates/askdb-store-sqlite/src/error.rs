//! Error type for `askdb-store-sqlite`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] askdb_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("username or email already registered")]
  UserExists,

  #[error("no SQL statement given")]
  EmptyStatement,

  #[error("only a single SQL statement may be run at a time")]
  MultipleStatements,

  #[error("statement exceeded the {}s time limit", .0.as_secs())]
  QueryTimeout(Duration),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
