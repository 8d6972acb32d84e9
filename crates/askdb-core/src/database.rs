//! The target database: the one questions are asked about.
//!
//! Two capabilities are required of it, kept as separate traits so a backend
//! can be faked piecemeal in tests: inspecting its structure and running an
//! arbitrary SQL string.

use std::future::Future;

use serde_json::{Map, Value};

use crate::schema::SchemaSnapshot;

/// Reads table and column metadata from the live database.
pub trait SchemaInspector: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Enumerate every table in the default namespace with its columns, in
  /// database-reported order. Fails if the database cannot be reached.
  fn schema(&self) -> impl Future<Output = Result<SchemaSnapshot, Self::Error>> + Send + '_;
}

/// Runs SQL produced by the model.
///
/// The statement is passed through verbatim; whatever safety policy applies
/// (read-only access, timeouts, row caps) is the backend's to enforce.
pub trait QueryExecutor: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn execute<'a>(
    &'a self,
    sql: &'a str,
  ) -> impl Future<Output = Result<ResultSet, Self::Error>> + Send + 'a;
}

/// Rows returned by a [`QueryExecutor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
  pub columns:   Vec<String>,
  /// Each row holds one value per entry in `columns`.
  pub rows:      Vec<Vec<Value>>,
  /// Set when the backend stopped reading at its row cap.
  pub truncated: bool,
}

impl ResultSet {
  /// Each row as a `column → value` object, preserving column order.
  pub fn records(&self) -> Vec<Map<String, Value>> {
    self
      .rows
      .iter()
      .map(|row| {
        self
          .columns
          .iter()
          .cloned()
          .zip(row.iter().cloned())
          .collect::<Map<String, Value>>()
      })
      .collect()
  }

  /// The whole result set rendered as a single JSON array string. This is
  /// what the model and the client both receive.
  pub fn serialize(&self) -> String {
    Value::Array(self.records().into_iter().map(Value::Object).collect()).to_string()
  }
}
