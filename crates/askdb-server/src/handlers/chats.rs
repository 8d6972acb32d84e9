//! Handlers for `/chats` endpoints. All require a bearer token and only
//! ever touch the caller's own chats.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/chats` | Newest first |
//! | `POST`   | `/chats` | Body: `{"title": "..."}`, title optional |
//! | `DELETE` | `/chats` | Deletes every chat of the caller |
//! | `DELETE` | `/chats/{id}` | 404 if not the caller's |
//! | `GET`    | `/chats/{id}/messages` | Oldest first; 404 if not the caller's |

use askdb_core::{
  chat::{Chat, Message},
  model::LanguageModel,
  store::ChatStore,
};
use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::AuthUser,
  error::ApiError,
  extract::{JsonBody, PathParam},
};

#[derive(Debug, Serialize)]
pub struct Acknowledgement {
  pub message: String,
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /chats`
pub async fn list<M>(
  State(state): State<AppState<M>>,
  AuthUser(user): AuthUser,
) -> Result<Json<Vec<Chat>>, ApiError>
where
  M: LanguageModel,
{
  Ok(Json(state.store.list_chats(user.id).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateBody {
  #[serde(default)]
  pub title: Option<String>,
}

/// `POST /chats`
pub async fn create<M>(
  State(state): State<AppState<M>>,
  AuthUser(user): AuthUser,
  JsonBody(body): JsonBody<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  M: LanguageModel,
{
  let title = body.title.filter(|t| !t.trim().is_empty());
  let chat = state.store.create_chat(user.id, title).await?;
  tracing::debug!(chat_id = chat.id, user_id = user.id, "chat created");
  Ok((StatusCode::CREATED, Json(chat)))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /chats/{id}`
pub async fn delete_one<M>(
  State(state): State<AppState<M>>,
  AuthUser(user): AuthUser,
  PathParam(id): PathParam<i64>,
) -> Result<Json<Acknowledgement>, ApiError>
where
  M: LanguageModel,
{
  if !state.store.delete_chat(id, user.id).await? {
    return Err(ApiError::chat_not_found());
  }
  Ok(Json(Acknowledgement { message: "Chat deleted successfully".to_string() }))
}

/// `DELETE /chats`
pub async fn delete_all<M>(
  State(state): State<AppState<M>>,
  AuthUser(user): AuthUser,
) -> Result<Json<Acknowledgement>, ApiError>
where
  M: LanguageModel,
{
  let removed = state.store.delete_all_chats(user.id).await?;
  tracing::debug!(user_id = user.id, removed, "all chats deleted");
  Ok(Json(Acknowledgement { message: "All chats deleted successfully".to_string() }))
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// `GET /chats/{id}/messages`
pub async fn messages<M>(
  State(state): State<AppState<M>>,
  AuthUser(user): AuthUser,
  PathParam(id): PathParam<i64>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  M: LanguageModel,
{
  state
    .store
    .get_chat(id, user.id)
    .await?
    .ok_or_else(ApiError::chat_not_found)?;
  Ok(Json(state.store.list_chat_messages(id, user.id).await?))
}
