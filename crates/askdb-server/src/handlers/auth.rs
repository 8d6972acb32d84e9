//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/signup` | Body: `{"username", "email", "password"}`; 409 on duplicates |
//! | `POST` | `/auth/login`  | Form: `username`, `password`; returns a bearer token |
//! | `GET`  | `/auth/me`     | The caller |

use askdb_core::{model::LanguageModel, store::UserStore, user::{NewUser, User}};
use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  AppState,
  auth::{AuthUser, hash_password, issue_token, verify_password},
  error::ApiError,
  extract::{FormBody, JsonBody},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
  pub id:       i64,
  pub username: String,
  pub email:    String,
}

impl From<User> for UserResponse {
  fn from(u: User) -> Self { Self { id: u.id, username: u.username, email: u.email } }
}

// ─── Signup ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignupBody {
  pub username: String,
  pub email:    String,
  pub password: String,
}

impl SignupBody {
  fn validate(&self) -> Result<(), ApiError> {
    if self.username.trim().is_empty() {
      return Err(ApiError::Validation("username must not be empty".to_string()));
    }
    let valid_email = self
      .email
      .split_once('@')
      .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
      return Err(ApiError::Validation(format!("invalid email address: {}", self.email)));
    }
    if self.password.is_empty() {
      return Err(ApiError::Validation("password must not be empty".to_string()));
    }
    Ok(())
  }
}

/// `POST /auth/signup`
pub async fn signup<M>(
  State(state): State<AppState<M>>,
  JsonBody(body): JsonBody<SignupBody>,
) -> Result<impl IntoResponse, ApiError>
where
  M: LanguageModel,
{
  body.validate()?;
  let password_hash = hash_password(&body.password)?;
  let user = state
    .store
    .create_user(NewUser {
      username: body.username.trim().to_string(),
      email: body.email.trim().to_string(),
      password_hash,
    })
    .await?;
  info!(user_id = user.id, username = %user.username, "user registered");
  Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginForm {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub token_type:   String,
}

fn incorrect_login() -> ApiError {
  ApiError::Unauthenticated("Incorrect username or password".to_string())
}

/// `POST /auth/login`
pub async fn login<M>(
  State(state): State<AppState<M>>,
  FormBody(form): FormBody<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError>
where
  M: LanguageModel,
{
  let (user, password_hash) = state
    .store
    .find_credentials(&form.username)
    .await?
    .ok_or_else(incorrect_login)?;
  if !verify_password(&form.password, &password_hash) {
    return Err(incorrect_login());
  }

  let access_token = issue_token(user.id, &state.auth)?;
  info!(user_id = user.id, "token issued");
  Ok(Json(TokenResponse { access_token, token_type: "bearer".to_string() }))
}

// ─── Me ───────────────────────────────────────────────────────────────────────

/// `GET /auth/me`
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> { Json(UserResponse::from(user)) }
