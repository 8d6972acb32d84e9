//! Events of the streaming query protocol and their wire framing.
//!
//! A successful stream is `sql`, `results`, zero or more `token`s, then
//! `end`. A failure at any point produces a single `error` and nothing
//! after it. Each event travels as one `data: <json>\n\n` frame.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum QueryEvent {
  /// The SQL extracted from the model's tool call.
  Sql(String),
  /// The serialised result rows.
  Results(String),
  /// A fragment of the explanation, in generation order.
  Token(String),
  End,
  Error(String),
}

impl QueryEvent {
  /// `end` and `error` close the stream.
  pub fn is_terminal(&self) -> bool { matches!(self, Self::End | Self::Error(_)) }

  pub fn to_json(&self) -> String {
    serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error"}"#.to_owned())
  }

  /// The complete wire frame for this event.
  #[cfg(test)]
  fn frame(&self) -> String { format!("data: {}\n\n", self.to_json()) }
}

// ─── Decoding ────────────────────────────────────────────────────────────────

/// A `data:` payload pulled out of an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLine {
  Payload(String),
  /// The `[DONE]` sentinel some upstream APIs send before closing.
  Done,
}

/// Incremental splitter for `text/event-stream` bodies.
///
/// Chunks may end anywhere, including inside a multi-byte character, so raw
/// bytes are buffered until a full line is available. Only `data:` fields
/// are surfaced; comments, `event:` and `id:` fields are skipped.
#[derive(Debug, Default)]
pub struct DataLineDecoder {
  buffer: Vec<u8>,
}

impl DataLineDecoder {
  pub fn new() -> Self { Self::default() }

  /// Feed a chunk and return every complete `data:` line it finished.
  pub fn push(&mut self, chunk: &[u8]) -> Vec<DataLine> {
    self.buffer.extend_from_slice(chunk);
    let mut lines = Vec::new();
    while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
      let line: Vec<u8> = self.buffer.drain(..=pos).collect();
      if let Some(data) = parse_line(&line) {
        lines.push(data);
      }
    }
    lines
  }

  /// Flush a trailing line that was not newline-terminated.
  pub fn finish(&mut self) -> Option<DataLine> {
    let rest = std::mem::take(&mut self.buffer);
    parse_line(&rest)
  }
}

fn parse_line(raw: &[u8]) -> Option<DataLine> {
  let line = String::from_utf8_lossy(raw);
  let line = line.trim_end_matches(['\r', '\n']);
  let data = line.strip_prefix("data:")?;
  let data = data.strip_prefix(' ').unwrap_or(data);
  if data == "[DONE]" {
    Some(DataLine::Done)
  } else if data.is_empty() {
    None
  } else {
    Some(DataLine::Payload(data.to_owned()))
  }
}
