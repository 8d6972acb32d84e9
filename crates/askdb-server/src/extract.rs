//! Request extractors whose rejections render as [`ApiError`], so a
//! malformed body or path still answers with `{"error": message}`.

use axum::extract::{
  FromRequest, FromRequestParts,
  rejection::{FormRejection, JsonRejection, PathRejection},
};

use crate::error::ApiError;

/// A JSON request body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// A `application/x-www-form-urlencoded` request body.
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct FormBody<T>(pub T);

/// Typed path parameters.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    match rejection {
      JsonRejection::JsonDataError(e) => ApiError::Validation(e.body_text()),
      other => ApiError::BadRequest(other.body_text()),
    }
  }
}

impl From<FormRejection> for ApiError {
  fn from(rejection: FormRejection) -> Self {
    match rejection {
      FormRejection::FailedToDeserializeFormBody(e) => ApiError::Validation(e.body_text()),
      other => ApiError::BadRequest(other.body_text()),
    }
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

