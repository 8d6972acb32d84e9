//! Plain-text rendering of answers, chats and schemas.

use std::io::{self, Write};

use askdb_core::{
  chat::{Chat, Message},
  event::QueryEvent,
  schema::SchemaSnapshot,
};
use serde_json::{Map, Value};

/// Rows shown before the rest is summarised.
const MAX_DISPLAY_ROWS: usize = 20;

/// Write one streamed event. Tokens are written without a line break so the
/// explanation reads as continuous prose.
pub fn event(event: &QueryEvent, out: &mut impl Write) -> io::Result<()> {
  match event {
    QueryEvent::Sql(sql) => writeln!(out, "SQL:\n  {sql}\n"),
    QueryEvent::Results(rows) => writeln!(out, "Results:\n{}\n", results(rows)),
    QueryEvent::Token(text) => {
      write!(out, "{text}")?;
      out.flush()
    }
    QueryEvent::End => writeln!(out),
    QueryEvent::Error(message) => writeln!(out, "\nerror: {message}"),
  }
}

/// Lay out a serialised result set as a pipe-separated table. Anything that
/// is not a list of records is printed as-is.
pub fn results(json: &str) -> String {
  let Ok(records) = serde_json::from_str::<Vec<Map<String, Value>>>(json) else {
    return json.to_string();
  };
  let Some(first) = records.first() else {
    return "  (no rows)".to_string();
  };

  let columns: Vec<&String> = first.keys().collect();
  let mut lines = vec![format!(
    "  {}",
    columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" | ")
  )];
  for record in records.iter().take(MAX_DISPLAY_ROWS) {
    let cells: Vec<String> = columns
      .iter()
      .map(|c| match record.get(*c) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "NULL".to_string(),
        Some(other) => other.to_string(),
      })
      .collect();
    lines.push(format!("  {}", cells.join(" | ")));
  }
  if records.len() > MAX_DISPLAY_ROWS {
    lines.push(format!("  ... {} more rows", records.len() - MAX_DISPLAY_ROWS));
  }
  lines.join("\n")
}

pub fn chat_line(chat: &Chat) -> String {
  format!("{:>5}  {}  {}", chat.id, chat.created_at.format("%Y-%m-%d %H:%M"), chat.title)
}

pub fn message_block(message: &Message) -> String {
  format!("[{}] {}:\n{}\n", message.created_at.format("%Y-%m-%d %H:%M:%S"), message.role, message.content)
}

pub fn schema(schema: &SchemaSnapshot) -> String {
  if schema.is_empty() {
    return "(no tables)".to_string();
  }
  askdb_core::tool::render_schema(schema)
}
