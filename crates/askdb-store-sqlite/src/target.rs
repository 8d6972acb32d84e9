//! [`SqliteDatabase`]: a SQLite target database: the one questions are
//! asked about.
//!
//! SQL arrives from the model unmodified. The guard rails live here:
//!
//! - the file is opened read-only unless configured otherwise;
//! - a string holding more than one statement is rejected before anything
//!   runs (trailing `;`, whitespace and comments are fine);
//! - each statement gets its own deadline, counted from when it starts on
//!   the connection thread, and is aborted from a progress handler once the
//!   deadline passes;
//! - only the first `max_rows` rows are read.

use std::{
  path::Path,
  time::{Duration, Instant},
};

use askdb_core::{
  database::{QueryExecutor, ResultSet, SchemaInspector},
  schema::{ColumnInfo, SchemaSnapshot, TableInfo},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rusqlite::{Batch, ErrorCode, OpenFlags, types::ValueRef};
use serde_json::Value;

use crate::{Error, Result};

/// Limits applied to every statement run through [`SqliteDatabase`].
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
  pub max_rows:          usize,
  pub statement_timeout: Duration,
}

impl Default for QueryLimits {
  fn default() -> Self {
    Self { max_rows: 1000, statement_timeout: Duration::from_secs(30) }
  }
}

/// Virtual machine instructions between two deadline checks.
const PROGRESS_OPS: i32 = 1000;

/// Cloning is cheap; the connection is shared.
#[derive(Clone)]
pub struct SqliteDatabase {
  conn:   tokio_rusqlite::Connection,
  limits: QueryLimits,
}

impl SqliteDatabase {
  /// Open the database at `path`. With `read_only` set, any statement that
  /// writes fails at execution time.
  pub async fn open(path: impl AsRef<Path>, read_only: bool, limits: QueryLimits) -> Result<Self> {
    let flags = if read_only {
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
      OpenFlags::default()
    };
    let conn = tokio_rusqlite::Connection::open_with_flags(path, flags).await?;
    Ok(Self { conn, limits })
  }

  /// Open an empty, writable in-memory database.
  pub async fn open_in_memory(limits: QueryLimits) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Ok(Self { conn, limits })
  }

  pub fn limits(&self) -> QueryLimits { self.limits }
}

/// Map a SQLite value onto JSON. Blobs become base64 strings and non-finite
/// reals become `null`.
fn json_value(value: ValueRef<'_>) -> Value {
  match value {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::from(i),
    ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
    ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => Value::String(B64.encode(b)),
  }
}

// ─── SchemaInspector impl ────────────────────────────────────────────────────

impl SchemaInspector for SqliteDatabase {
  type Error = Error;

  async fn schema(&self) -> Result<SchemaSnapshot> {
    let tables = self
      .conn
      .call(|conn| {
        let mut names_stmt = conn.prepare(
          "SELECT name FROM sqlite_master
           WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
           ORDER BY rowid",
        )?;
        let names = names_stmt
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut columns_stmt =
          conn.prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
          let columns = columns_stmt
            .query_map([&name], |row| Ok(ColumnInfo::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          tables.push(TableInfo::new(name, columns));
        }
        Ok(tables)
      })
      .await?;

    Ok(SchemaSnapshot { tables })
  }
}

// ─── QueryExecutor impl ──────────────────────────────────────────────────────

impl QueryExecutor for SqliteDatabase {
  type Error = Error;

  async fn execute(&self, sql: &str) -> Result<ResultSet> {
    let sql    = sql.to_owned();
    let limits = self.limits;

    let result = self
      .conn
      .call(move |conn| {
        let deadline = Instant::now() + limits.statement_timeout;
        conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
        let outcome = run_single(conn, &sql, limits);
        conn.progress_handler(0, None::<fn() -> bool>);
        Ok(outcome)
      })
      .await?
      .inspect_err(|e| {
        if let Error::QueryTimeout(timeout) = e {
          tracing::warn!(?timeout, "statement aborted at its deadline");
        }
      })?;

    if result.truncated {
      tracing::warn!(max_rows = limits.max_rows, "result set truncated at row cap");
    }
    Ok(result)
  }
}

/// Prepare exactly one statement from `sql` and read up to `max_rows` rows.
fn run_single(conn: &rusqlite::Connection, sql: &str, limits: QueryLimits) -> Result<ResultSet> {
  let failed = |e: rusqlite::Error| match e.sqlite_error_code() {
    Some(ErrorCode::OperationInterrupted) => Error::QueryTimeout(limits.statement_timeout),
    _ => Error::Database(e.into()),
  };

  let mut batch = Batch::new(conn, sql);
  let Some(mut stmt) = batch.next().map_err(failed)? else {
    return Err(Error::EmptyStatement);
  };
  if batch.next().map_err(failed)?.is_some() {
    return Err(Error::MultipleStatements);
  }

  let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
  let mut rows      = stmt.query([]).map_err(failed)?;
  let mut out       = Vec::new();
  let mut truncated = false;
  while let Some(row) = rows.next().map_err(failed)? {
    if out.len() == limits.max_rows {
      truncated = true;
      break;
    }
    let values = (0..columns.len())
      .map(|i| row.get_ref(i).map(json_value))
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(failed)?;
    out.push(values);
  }

  Ok(ResultSet { columns, rows: out, truncated })
}
