//! Handlers for `/series/{id}/links`.

use axum::extract::State;
use serde::Deserialize;
use shelf_core::{
  series::{SeriesMapping, SeriesMember},
  store::TrustStore,
};

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{Json, Path},
};

#[derive(Debug, Deserialize)]
pub struct RelinkBody {
  pub members: Vec<SeriesMember>,
}

/// `PUT /series/{id}/links`: recompute the mapping from `members`.
pub async fn relink<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  caller: Authenticated,
  Path(series_id): Path<String>,
  Json(body): Json<RelinkBody>,
) -> Result<Json<SeriesMapping>, ApiError> {
  let mapping = state.pipeline.linker.relink(&series_id, body.members, &caller.actor()).await?;
  Ok(Json(mapping))
}

/// `GET /series/{id}/links`
pub async fn get<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  Path(series_id): Path<String>,
) -> Result<Json<SeriesMapping>, ApiError> {
  Ok(Json(state.pipeline.linker.mapping(&series_id).await?))
}
