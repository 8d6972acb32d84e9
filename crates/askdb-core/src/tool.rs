//! The `ask_database` tool: building its descriptor from a schema snapshot
//! and decoding the model's call to it.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
  Error, Result,
  model::ToolCall,
  schema::SchemaSnapshot,
};

/// Name of the single tool offered to the model.
pub const ASK_DATABASE: &str = "ask_database";

/// A callable contract offered to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
  pub name:        String,
  pub description: String,
  pub parameter:   ToolParameter,
}

/// The tool's sole parameter. Always a string.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
  pub name:        String,
  pub description: String,
  pub required:    bool,
}

impl ToolDescriptor {
  /// JSON Schema of the tool's argument object.
  pub fn parameters_schema(&self) -> Value {
    let required: Vec<&str> = if self.parameter.required {
      vec![self.parameter.name.as_str()]
    } else {
      vec![]
    };
    let mut properties = serde_json::Map::new();
    properties.insert(
      self.parameter.name.clone(),
      json!({ "type": "string", "description": self.parameter.description }),
    );
    json!({
      "type": "object",
      "properties": properties,
      "required": required,
    })
  }
}

/// Render a snapshot as the model reads it: a `Table:` header per table, one
/// `- name (type)` line per column, tables separated by a blank line.
pub fn render_schema(schema: &SchemaSnapshot) -> String {
  schema
    .tables
    .iter()
    .map(|table| {
      let mut block = format!("Table: {}", table.table_name);
      for column in &table.columns {
        block.push_str(&format!("\n- {} ({})", column.name, column.data_type));
      }
      block
    })
    .collect::<Vec<_>>()
    .join("\n\n")
}

/// Build the `ask_database` descriptor for `schema`.
///
/// No constraint beyond "string, required" is placed on the SQL; it is
/// validated only by executing it.
pub fn build_tool(schema: &SchemaSnapshot) -> ToolDescriptor {
  ToolDescriptor {
    name:        ASK_DATABASE.to_owned(),
    description: "Use this function to answer database questions.".to_owned(),
    parameter:   ToolParameter {
      name:        "query".to_owned(),
      description: format!("SQL query using schema:\n{}", render_schema(schema)),
      required:    true,
    },
  }
}

// ─── Decoding calls ──────────────────────────────────────────────────────────

/// A decoded tool call, keyed by tool name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum ToolInvocation {
  #[serde(rename = "ask_database")]
  AskDatabase { query: String },
}

impl ToolInvocation {
  /// Decode `call`. Unknown tool names, arguments that are not a JSON
  /// object, and missing or mistyped fields are all errors.
  pub fn decode(call: &ToolCall) -> Result<Self> {
    let arguments: Value = serde_json::from_str(&call.function.arguments).map_err(|e| {
      Error::MalformedToolCall(format!("arguments are not valid JSON: {e}"))
    })?;
    if !arguments.is_object() {
      return Err(Error::MalformedToolCall(
        "arguments are not a JSON object".to_owned(),
      ));
    }
    serde_json::from_value(json!({ "name": call.function.name, "arguments": arguments }))
      .map_err(|e| Error::MalformedToolCall(format!("{}: {e}", call.function.name)))
  }

  /// The SQL carried by an `ask_database` call.
  pub fn into_sql(self) -> String {
    match self {
      Self::AskDatabase { query } => query,
    }
  }
}

/// The model is constrained to one tool, so exactly one call is expected.
pub fn single_call(calls: &[ToolCall]) -> Result<&ToolCall> {
  match calls {
    [] => Err(Error::NoToolCall),
    [call] => Ok(call),
    more => Err(Error::UnexpectedToolCallCount(more.len())),
  }
}
