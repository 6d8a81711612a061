//! `POST /jobs/trending-decay`: run one decay cycle now, with the configured
//! parameters.

use axum::extract::State;
use shelf_core::store::TrustStore;
use shelf_trust::trending::DecayReport;

use crate::{AppState, auth::Authenticated, error::ApiError, extract::Json};

pub async fn trending_decay<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  caller: Authenticated,
) -> Result<Json<DecayReport>, ApiError> {
  let actor = caller.actor();
  actor.require_elevated()?;
  tracing::info!(actor = ?actor.subject_id(), "manual decay cycle requested");
  let report = state.pipeline.decay.run_decay_cycle(state.config.decay.params()).await?;
  Ok(Json(report))
}
