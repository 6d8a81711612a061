//! Handlers for `/reports` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/reports` | Body: [`ReportInput`]; anonymous allowed; returns 201 + `{"id"}` |
//! | `GET`  | `/reports` | `?limit` (default 50, capped at 100); elevated |
//! | `POST` | `/reports/{id}/resolve` | Idempotent; elevated |
//! | `GET`  | `/reports/{id}/target` | Stored snapshot next to the live document; elevated |

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shelf_core::{report::ModerationReport, store::TrustStore};
use shelf_trust::moderation::ReportInput;
use uuid::Uuid;

use crate::{
  AppState,
  auth::{Authenticated, MaybePrincipal},
  error::ApiError,
  extract::{Json, Path, Query},
};

/// `POST /reports`
pub async fn create<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  MaybePrincipal(reporter): MaybePrincipal,
  Json(body): Json<ReportInput>,
) -> Result<impl IntoResponse, ApiError> {
  let report = state.pipeline.moderation.report(body, reporter.as_ref()).await?;
  Ok((StatusCode::CREATED, Json(json!({ "id": report.report_id }))))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default = "default_limit")]
  pub limit: usize,
}

fn default_limit() -> usize { 50 }

/// `GET /reports?limit=<n>`
pub async fn list<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  caller: Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ModerationReport>>, ApiError> {
  let reports = state.pipeline.moderation.list_open(params.limit, &caller.actor()).await?;
  Ok(Json(reports))
}

/// `POST /reports/{id}/resolve`
pub async fn resolve<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  caller: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<ModerationReport>, ApiError> {
  let report = state.pipeline.moderation.resolve(id, &caller.actor()).await?;
  Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct TargetView {
  /// What the reporter saw.
  pub snapshot: Option<serde_json::Value>,
  /// What is stored now; `null` if the document was deleted.
  pub live:     Option<serde_json::Value>,
}

/// `GET /reports/{id}/target`
pub async fn target<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  caller: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<TargetView>, ApiError> {
  let actor = caller.actor();
  let queue = &state.pipeline.moderation;
  let report = queue.get(id, &actor).await?;
  let live = queue.fetch_target_snapshot(&report, &actor).await?;
  Ok(Json(TargetView { snapshot: report.snapshot, live }))
}
