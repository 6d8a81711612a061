//! `PUT /claims/{subject_id}`: grant or revoke the elevated claim.

use axum::extract::State;
use serde::Deserialize;
use shelf_core::{principal::Claims, store::TrustStore};

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{Json, Path},
};

#[derive(Debug, Deserialize)]
pub struct SetClaimBody {
  pub elevated: bool,
}

pub async fn set<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  caller: Authenticated,
  Path(subject_id): Path<String>,
  Json(body): Json<SetClaimBody>,
) -> Result<Json<Claims>, ApiError> {
  let claims = state
    .pipeline
    .claims
    .set_elevated_claim(&subject_id, body.elevated, &caller.actor())
    .await?;
  Ok(Json(claims))
}
