//! Question resolution endpoints.
//!
//! `POST /query` answers with a `text/event-stream` of
//! `data: {"type": ..., "content": ...}` frames; `POST /query/complete`
//! waits and answers with one JSON document. Both require the chat to
//! belong to the caller.

use std::convert::Infallible;

use askdb_core::{model::LanguageModel, store::ChatStore};
use axum::{
  Json,
  extract::State,
  response::sse::{Event, Sse},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::{StreamExt as _, wrappers::ReceiverStream};

use crate::{AppState, auth::AuthUser, error::ApiError, extract::JsonBody};

#[derive(Debug, Deserialize)]
pub struct QueryBody {
  pub question: String,
  pub chat_id:  i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteResponse {
  pub success:       bool,
  pub sql_query:     String,
  pub query_results: String,
  pub explanation:   String,
}

async fn check_request<M>(
  state: &AppState<M>,
  user_id: i64,
  body: &QueryBody,
) -> Result<(), ApiError>
where
  M: LanguageModel,
{
  if body.question.trim().is_empty() {
    return Err(ApiError::Validation("question must not be empty".to_string()));
  }
  state
    .store
    .get_chat(body.chat_id, user_id)
    .await?
    .ok_or_else(ApiError::chat_not_found)?;
  Ok(())
}

/// `POST /query`
pub async fn stream<M>(
  State(state): State<AppState<M>>,
  AuthUser(user): AuthUser,
  JsonBody(body): JsonBody<QueryBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError>
where
  M: LanguageModel + 'static,
{
  check_request(&state, user.id, &body).await?;

  let events = state.resolver.spawn_stream(body.question, body.chat_id);
  let frames = ReceiverStream::new(events)
    .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));
  Ok(Sse::new(frames))
}

/// `POST /query/complete`
pub async fn complete<M>(
  State(state): State<AppState<M>>,
  AuthUser(user): AuthUser,
  JsonBody(body): JsonBody<QueryBody>,
) -> Result<Json<CompleteResponse>, ApiError>
where
  M: LanguageModel,
{
  check_request(&state, user.id, &body).await?;

  let resolution = state.resolver.resolve(&body.question, body.chat_id).await?;
  Ok(Json(CompleteResponse {
    success:       true,
    sql_query:     resolution.sql,
    query_results: resolution.results,
    explanation:   resolution.explanation,
  }))
}
