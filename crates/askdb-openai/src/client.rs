use std::collections::VecDeque;

use askdb_core::{
  event::{DataLine, DataLineDecoder},
  model::{AssistantMessage, CompletionRequest, LanguageModel, TokenStream},
};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use tracing::debug;

use crate::{
  Error, Result,
  wire::{self, ChatRequest},
};

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
  /// API root, e.g. `https://api.openai.com/v1`. `/chat/completions` is
  /// appended.
  pub base_url: String,
  /// Sent as a bearer token when set.
  pub api_key:  Option<String>,
  pub model:    String,
}

impl Default for OpenAiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.openai.com/v1".to_owned(),
      api_key:  None,
      model:    "gpt-4o-2024-11-20".to_owned(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
  http:   reqwest::Client,
  config: OpenAiConfig,
}

impl OpenAiClient {
  pub fn new(config: OpenAiConfig) -> Self { Self::with_client(reqwest::Client::new(), config) }

  pub fn with_client(http: reqwest::Client, config: OpenAiConfig) -> Self {
    Self { http, config }
  }

  pub fn config(&self) -> &OpenAiConfig { &self.config }

  fn endpoint(&self) -> String {
    format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
  }

  async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response> {
    debug!(
      model = %self.config.model,
      messages = request.messages.len(),
      tools = request.tools.len(),
      stream,
      "chat completion request"
    );
    let body = ChatRequest::new(&self.config.model, request, stream);
    let mut builder = self.http.post(self.endpoint()).json(&body);
    if let Some(key) = &self.config.api_key {
      builder = builder.bearer_auth(key);
    }

    let response = builder.send().await?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Api { status: status.as_u16(), body });
    }
    Ok(response)
  }
}

impl LanguageModel for OpenAiClient {
  type Error = Error;

  async fn complete(&self, request: CompletionRequest) -> Result<AssistantMessage> {
    let response = self.send(&request, false).await?;
    let body = response.bytes().await?;
    wire::parse_completion(&body)
  }

  async fn complete_stream(&self, request: CompletionRequest) -> Result<TokenStream<Error>> {
    let response = self.send(&request, true).await?;
    Ok(token_stream(Box::pin(response.bytes_stream())).boxed())
  }
}

// ─── Streaming ───────────────────────────────────────────────────────────────

struct TokenState<S> {
  body:     S,
  decoder:  DataLineDecoder,
  pending:  VecDeque<Result<String>>,
  finished: bool,
}

/// Turn a raw `text/event-stream` body into the text fragments of its
/// chunks. Ends at `[DONE]` or when the body ends; the first error ends it
/// too.
fn token_stream<S, B, E>(body: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
  S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
  B: AsRef<[u8]> + Send,
  E: Send,
  Error: From<E>,
{
  let state = TokenState {
    body,
    decoder: DataLineDecoder::new(),
    pending: VecDeque::new(),
    finished: false,
  };

  stream::unfold(state, |mut state| async move {
    loop {
      if let Some(item) = state.pending.pop_front() {
        return Some((item, state));
      }
      if state.finished {
        return None;
      }

      let lines = match state.body.next().await {
        Some(Ok(chunk)) => state.decoder.push(chunk.as_ref()),
        Some(Err(e)) => {
          state.finished = true;
          return Some((Err(Error::from(e)), state));
        }
        None => {
          state.finished = true;
          state.decoder.finish().into_iter().collect()
        }
      };

      for line in lines {
        match line {
          DataLine::Done => {
            state.finished = true;
            break;
          }
          DataLine::Payload(payload) => match wire::parse_chunk(&payload) {
            Ok(Some(token)) => state.pending.push_back(Ok(token)),
            Ok(None) => {}
            Err(e) => {
              state.pending.push_back(Err(e));
              state.finished = true;
              break;
            }
          },
        }
      }
    }
  })
}
