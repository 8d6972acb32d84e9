//! Assembly of the conversation context sent to the first model call.

use askdb_core::{chat::Turn, model::ModelMessage, schema::SchemaSnapshot};

/// Marker in the system prompt template replaced by the schema JSON.
pub const SCHEMA_PLACEHOLDER: &str = "{SCHEMA}";

/// Used when no template file is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful SQL assistant. \
Use the database schema to create accurate queries:
{SCHEMA}";

pub fn render_system_prompt(template: &str, schema: &SchemaSnapshot) -> String {
  template.replace(SCHEMA_PLACEHOLDER, &schema.to_pretty_json())
}

/// `[system] + history (oldest first) + [question]`.
///
/// The full history is replayed verbatim: nothing is dropped, merged or
/// reordered.
pub fn assemble_context(
  template: &str,
  schema: &SchemaSnapshot,
  history: Vec<Turn>,
  question: &str,
) -> Vec<ModelMessage> {
  let mut messages = Vec::with_capacity(history.len() + 2);
  messages.push(ModelMessage::system(render_system_prompt(template, schema)));
  messages.extend(history.into_iter().map(ModelMessage::from));
  messages.push(ModelMessage::user(question));
  messages
}
