//! `GET /audit?kind&actor&since&until&limit`. Elevated callers only.

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shelf_core::{
  audit::{AuditEntry, AuditFilter},
  store::TrustStore,
};

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  extract::{Json, Query},
};

#[derive(Debug, Deserialize)]
pub struct QueryParams {
  pub kind:  Option<String>,
  pub actor: Option<String>,
  /// Inclusive.
  pub since: Option<DateTime<Utc>>,
  /// Exclusive.
  pub until: Option<DateTime<Utc>>,
  #[serde(default = "default_limit")]
  pub limit: usize,
}

fn default_limit() -> usize { 100 }

pub async fn query<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  caller: Authenticated,
  Query(params): Query<QueryParams>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
  let filter = AuditFilter {
    kind:  params.kind,
    actor: params.actor,
    since: params.since,
    until: params.until,
  };
  let entries = state.pipeline.audit.query(&filter, params.limit, &caller.actor()).await?;
  Ok(Json(entries))
}
