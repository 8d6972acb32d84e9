//! Request and response bodies of the chat-completions API.

use askdb_core::model::{
  AssistantMessage, CompletionRequest, ModelMessage, ToolCall, ToolChoice,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{Error, Result};

// ─── Requests ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
  model:       &'a str,
  messages:    &'a [ModelMessage],
  #[serde(skip_serializing_if = "Vec::is_empty")]
  tools:       Vec<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  tool_choice: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
  stream:      bool,
}

impl<'a> ChatRequest<'a> {
  pub(crate) fn new(model: &'a str, request: &'a CompletionRequest, stream: bool) -> Self {
    let tools = request
      .tools
      .iter()
      .map(|tool| {
        json!({
          "type": "function",
          "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters_schema(),
          }
        })
      })
      .collect();
    let tool_choice = match &request.tool_choice {
      ToolChoice::Auto => None,
      ToolChoice::Forced(name) => Some(json!({ "type": "function", "function": { "name": name } })),
    };
    Self {
      model,
      messages: &request.messages,
      tools,
      tool_choice,
      temperature: request.temperature,
      stream,
    }
  }
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: WireMessage,
}

/// Either field may be `null` or absent.
#[derive(Debug, Deserialize)]
struct WireMessage {
  #[serde(default)]
  content:    Option<String>,
  #[serde(default)]
  tool_calls: Option<Vec<ToolCall>>,
}

pub(crate) fn parse_completion(body: &[u8]) -> Result<AssistantMessage> {
  let response: ChatResponse = serde_json::from_slice(body)?;
  let choice = response.choices.into_iter().next().ok_or(Error::EmptyChoices)?;
  Ok(AssistantMessage {
    content:    choice.message.content,
    tool_calls: choice.message.tool_calls.unwrap_or_default(),
  })
}

#[derive(Debug, Deserialize)]
struct ChunkResponse {
  #[serde(default)]
  choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
  #[serde(default)]
  delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
  #[serde(default)]
  content: Option<String>,
}

/// The text fragment carried by one streamed chunk, if any. Role-only and
/// finish chunks carry none.
pub(crate) fn parse_chunk(payload: &str) -> Result<Option<String>> {
  let chunk: ChunkResponse = serde_json::from_str(payload)?;
  Ok(chunk.choices.into_iter().next().and_then(|c| c.delta.content))
}

#[cfg(test)]
mod tests {
  use askdb_core::{
    schema::{ColumnInfo, SchemaSnapshot, TableInfo},
    tool::{ASK_DATABASE, build_tool},
  };

  use super::*;

  fn forced_request() -> CompletionRequest {
    let schema = SchemaSnapshot {
      tables: vec![TableInfo::new("film", vec![ColumnInfo::new("film_id", "integer")])],
    };
    CompletionRequest {
      messages:    vec![ModelMessage::system("sys"), ModelMessage::user("How many films?")],
      tools:       vec![build_tool(&schema)],
      tool_choice: ToolChoice::Forced(ASK_DATABASE.into()),
      temperature: Some(0.2),
    }
  }

  #[test]
  fn forced_request_names_the_tool() {
    let request = forced_request();
    let body = serde_json::to_value(ChatRequest::new("gpt-test", &request, false)).unwrap();

    assert_eq!(body["model"], "gpt-test");
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"][1], json!({ "role": "user", "content": "How many films?" }));
    assert_eq!(
      body["tool_choice"],
      json!({ "type": "function", "function": { "name": "ask_database" } })
    );
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["tools"][0]["function"]["name"], "ask_database");
    assert_eq!(body["tools"][0]["function"]["parameters"]["required"], json!(["query"]));
    assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
  }

  #[test]
  fn free_request_omits_tools_and_choice() {
    let request = CompletionRequest {
      messages: vec![ModelMessage::user("hi")],
      ..Default::default()
    };
    let body = serde_json::to_value(ChatRequest::new("m", &request, true)).unwrap();

    let fields = body.as_object().unwrap();
    assert!(!fields.contains_key("tools"));
    assert!(!fields.contains_key("tool_choice"));
    assert!(!fields.contains_key("temperature"));
    assert_eq!(body["stream"], true);
  }

  #[test]
  fn parses_tool_call_reply() {
    let body = br#"{
      "id": "chatcmpl-1",
      "choices": [{
        "index": 0,
        "message": {
          "role": "assistant",
          "content": null,
          "tool_calls": [{
            "id": "call_abc",
            "type": "function",
            "function": { "name": "ask_database", "arguments": "{\"query\":\"SELECT 1\"}" }
          }]
        },
        "finish_reason": "tool_calls"
      }]
    }"#;
    let reply = parse_completion(body).unwrap();
    assert_eq!(reply.content, None);
    assert_eq!(reply.tool_calls, vec![ToolCall::function(
      "call_abc",
      "ask_database",
      r#"{"query":"SELECT 1"}"#
    )]);
  }

  #[test]
  fn parses_text_reply_with_null_tool_calls() {
    let body = br#"{"choices":[{"message":{"role":"assistant","content":"1000","tool_calls":null}}]}"#;
    let reply = parse_completion(body).unwrap();
    assert_eq!(reply.content.as_deref(), Some("1000"));
    assert!(reply.tool_calls.is_empty());
  }

  #[test]
  fn empty_choices_is_an_error() {
    assert!(matches!(parse_completion(br#"{"choices":[]}"#), Err(Error::EmptyChoices)));
  }

  #[test]
  fn chunks_yield_delta_content() {
    assert_eq!(
      parse_chunk(r#"{"choices":[{"index":0,"delta":{"content":"There"}}]}"#).unwrap(),
      Some("There".into())
    );
    assert_eq!(
      parse_chunk(r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#).unwrap(),
      None
    );
    assert_eq!(
      parse_chunk(r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#).unwrap(),
      None
    );
    assert_eq!(parse_chunk(r#"{"choices":[]}"#).unwrap(), None);
    assert!(parse_chunk("not json").is_err());
  }
}
