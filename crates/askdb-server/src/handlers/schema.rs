//! `GET /schema`: the live target-database structure. Public.

use askdb_core::{database::SchemaInspector, model::LanguageModel, schema::SchemaSnapshot};
use axum::{Json, extract::State};
use serde::Serialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
  pub schema: SchemaSnapshot,
}

/// `GET /schema`
pub async fn get_schema<M>(
  State(state): State<AppState<M>>,
) -> Result<Json<SchemaResponse>, ApiError>
where
  M: LanguageModel,
{
  let schema = state.database.schema().await?;
  Ok(Json(SchemaResponse { schema }))
}
