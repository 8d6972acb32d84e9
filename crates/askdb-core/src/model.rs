//! The language-model collaborator: message shapes, requests and the
//! [`LanguageModel`] trait.
//!
//! Messages serialise in the widely used chat-completions shape (`role`
//! discriminant, assistant `tool_calls`, tool `tool_call_id`), so a client
//! for such an API can send them as-is.

use std::future::Future;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::{
  chat::{Role, Turn},
  tool::ToolDescriptor,
};

// ─── Messages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ModelMessage {
  System {
    content: String,
  },
  User {
    content: String,
  },
  Assistant {
    #[serde(default)]
    content:    Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
  },
  Tool {
    tool_call_id: String,
    name:         String,
    content:      String,
  },
}

impl ModelMessage {
  pub fn system(content: impl Into<String>) -> Self {
    Self::System { content: content.into() }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self::User { content: content.into() }
  }

  pub fn role(&self) -> Role {
    match self {
      Self::System { .. } => Role::System,
      Self::User { .. } => Role::User,
      Self::Assistant { .. } => Role::Assistant,
      Self::Tool { .. } => Role::Tool,
    }
  }

  /// Result message answering `call`.
  pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
    Self::Tool {
      tool_call_id: call.id.clone(),
      name:         call.function.name.clone(),
      content:      content.into(),
    }
  }
}

impl From<Turn> for ModelMessage {
  /// Replays a persisted turn. Tool results are never persisted, so a
  /// stray `tool` row is replayed as assistant text.
  fn from(turn: Turn) -> Self {
    match turn.role {
      Role::System => Self::System { content: turn.content },
      Role::User => Self::User { content: turn.content },
      Role::Assistant | Role::Tool => Self::Assistant {
        content:    Some(turn.content),
        tool_calls: Vec::new(),
      },
    }
  }
}

impl From<AssistantMessage> for ModelMessage {
  fn from(m: AssistantMessage) -> Self {
    Self::Assistant { content: m.content, tool_calls: m.tool_calls }
  }
}

/// A function call emitted by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
  pub id:       String,
  #[serde(rename = "type", default = "function_kind")]
  pub kind:     String,
  pub function: FunctionCall,
}

fn function_kind() -> String { "function".to_owned() }

impl ToolCall {
  pub fn function(
    id: impl Into<String>,
    name: impl Into<String>,
    arguments: impl Into<String>,
  ) -> Self {
    Self {
      id:       id.into(),
      kind:     function_kind(),
      function: FunctionCall { name: name.into(), arguments: arguments.into() },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
  pub name:      String,
  /// JSON-encoded argument object, exactly as the model produced it.
  pub arguments: String,
}

/// A whole (non-streamed) assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
  #[serde(default)]
  pub content:    Option<String>,
  #[serde(default)]
  pub tool_calls: Vec<ToolCall>,
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// Whether the model may answer freely or must call a specific tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolChoice {
  #[default]
  Auto,
  /// The model must emit a call to the named tool and no free text.
  Forced(String),
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
  pub messages:    Vec<ModelMessage>,
  pub tools:       Vec<ToolDescriptor>,
  pub tool_choice: ToolChoice,
  pub temperature: Option<f32>,
}

/// Incremental text fragments of a streamed reply, in generation order.
pub type TokenStream<E> = BoxStream<'static, Result<String, E>>;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a chat-completion capable language model.
pub trait LanguageModel: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Issue a request and wait for the whole reply.
  fn complete(
    &self,
    request: CompletionRequest,
  ) -> impl Future<Output = Result<AssistantMessage, Self::Error>> + Send + '_;

  /// Issue a request and receive the reply's text as it is generated.
  fn complete_stream(
    &self,
    request: CompletionRequest,
  ) -> impl Future<Output = Result<TokenStream<Self::Error>, Self::Error>> + Send + '_;
}
