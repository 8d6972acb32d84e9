//! Bearer-token identity: password hashing, JWT issue/verify, and the
//! [`AuthUser`] extractor.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use askdb_core::{model::LanguageModel, store::UserStore, user::User};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

/// Token signing settings for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  /// HS256 secret.
  pub jwt_secret:     String,
  pub token_lifetime: chrono::Duration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
  /// User id, as a decimal string.
  pub sub: String,
  pub exp: i64,
  pub iat: i64,
}

impl Claims {
  pub fn user_id(&self) -> Option<i64> { self.sub.parse().ok() }
}

pub fn issue_token(user_id: i64, config: &AuthConfig) -> Result<String, ApiError> {
  let now = Utc::now();
  let claims = Claims {
    sub: user_id.to_string(),
    exp: (now + config.token_lifetime).timestamp(),
    iat: now.timestamp(),
  };
  encode(
    &Header::default(),
    &claims,
    &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
  )
  .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
}

/// Check signature and expiry.
pub fn verify_token(token: &str, config: &AuthConfig) -> Result<Claims, ApiError> {
  decode::<Claims>(
    token,
    &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
    &Validation::default(),
  )
  .map(|data| data.claims)
  .map_err(|_| ApiError::invalid_credentials())
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
  PasswordHash::new(password_hash)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

/// The caller, resolved from a valid bearer token whose user still exists.
pub struct AuthUser(pub User);

impl<M> FromRequestParts<AppState<M>> for AuthUser
where
  M: LanguageModel + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<M>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer(&parts.headers).ok_or_else(|| {
      ApiError::Unauthenticated("Not authenticated".to_string())
    })?;
    let user_id = verify_token(token, &state.auth)?
      .user_id()
      .ok_or_else(ApiError::invalid_credentials)?;

    let user = state
      .store
      .get_user(user_id)
      .await?
      .ok_or_else(ApiError::invalid_credentials)?;
    Ok(AuthUser(user))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> AuthConfig {
    AuthConfig {
      jwt_secret:     "test-secret".to_string(),
      token_lifetime: chrono::Duration::minutes(30),
    }
  }

  #[test]
  fn issued_token_verifies() {
    let token = issue_token(42, &config()).unwrap();
    let claims = verify_token(&token, &config()).unwrap();
    assert_eq!(claims.user_id(), Some(42));
    assert_eq!(claims.exp - claims.iat, 30 * 60);
  }

  #[test]
  fn wrong_secret_is_rejected() {
    let token = issue_token(42, &config()).unwrap();
    let other = AuthConfig { jwt_secret: "other".to_string(), ..config() };
    assert!(matches!(verify_token(&token, &other), Err(ApiError::Unauthenticated(_))));
  }

  #[test]
  fn expired_token_is_rejected() {
    let expired = AuthConfig { token_lifetime: chrono::Duration::hours(-2), ..config() };
    let token = issue_token(42, &expired).unwrap();
    assert!(verify_token(&token, &config()).is_err());
  }

  #[test]
  fn password_hash_round_trip() {
    let hash = hash_password("secret").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("secret", &hash));
    assert!(!verify_password("wrong", &hash));
    assert!(!verify_password("secret", "not a phc string"));
  }

  #[test]
  fn bearer_header_parsing() {
    let mut headers = HeaderMap::new();
    assert_eq!(bearer(&headers), None);
    headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
    assert_eq!(bearer(&headers), None);
    headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
    assert_eq!(bearer(&headers), Some("abc.def"));
  }
}
