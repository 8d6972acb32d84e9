//! Structural snapshot of the target database.
//!
//! A snapshot is computed fresh for every request and never cached, so the
//! model always sees the live schema.

use serde::{Deserialize, Serialize};

/// Point-in-time list of tables and their columns.
///
/// Serialises as a bare array:
/// `[{"table_name": "film", "columns": [{"name": "film_id", "type": "integer"}]}]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSnapshot {
  pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
  pub table_name: String,
  /// In the order the database reports them.
  pub columns:    Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
  pub name:      String,
  /// Declared type as reported by the database; may be empty.
  #[serde(rename = "type")]
  pub data_type: String,
}

impl ColumnInfo {
  pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
    Self { name: name.into(), data_type: data_type.into() }
  }
}

impl TableInfo {
  pub fn new(table_name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
    Self { table_name: table_name.into(), columns }
  }
}

impl SchemaSnapshot {
  pub fn is_empty(&self) -> bool { self.tables.is_empty() }

  /// Pretty-printed JSON, as substituted into the system prompt.
  pub fn to_pretty_json(&self) -> String {
    serde_json::to_string_pretty(self).unwrap_or_else(|_| "[]".to_owned())
  }
}
