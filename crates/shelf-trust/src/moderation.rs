//! The moderation-report workflow.
//!
//! ```text
//!   report() ──▶ open ──resolve()──▶ resolved
//!                                      │
//!                          resolve() ──┘ (no-op, same report)
//! ```
//!
//! Submission and resolution each append their audit entry in the same store
//! write as the report change.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use shelf_core::{
  Error, Result,
  audit::{NewAuditEntry, kind},
  principal::{Actor, Principal},
  report::{ModerationReport, NewReport, ResolveOutcome},
  store::TrustStore,
};
use uuid::Uuid;

/// Upper bound on reports returned by [`ModerationQueue::list_open`].
pub const MAX_LIST_LIMIT: usize = 100;

/// What a reporter submits.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportInput {
  pub target_path:   String,
  pub reason:        String,
  #[serde(default)]
  pub snapshot:      Option<serde_json::Value>,
  #[serde(default)]
  pub evidence_refs: Vec<String>,
}

pub struct ModerationQueue<S> {
  store: Arc<S>,
}

impl<S> Clone for ModerationQueue<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: TrustStore> ModerationQueue<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// File a new `open` report. Anonymous reporters pass `None`.
  pub async fn report(
    &self,
    input: ReportInput,
    reporter: Option<&Principal>,
  ) -> Result<ModerationReport> {
    let target_path = input.target_path.trim();
    let reason = input.reason.trim();
    if target_path.is_empty() {
      return Err(Error::Validation("target_path must not be empty".into()));
    }
    if reason.is_empty() {
      return Err(Error::Validation("reason must not be empty".into()));
    }
    let evidence_refs: Vec<String> = input
      .evidence_refs
      .iter()
      .map(|r| r.trim())
      .filter(|r| !r.is_empty())
      .map(str::to_owned)
      .collect();

    let report_id = Uuid::new_v4();
    let created_by = reporter.map(|p| p.subject_id.clone());
    let audit = NewAuditEntry::new(
      kind::MODERATION_REPORT,
      created_by.as_deref(),
      json!({ "report_id": report_id, "target_path": target_path }),
    );
    let new = NewReport {
      report_id,
      created_by,
      target_path: target_path.to_owned(),
      reason: reason.to_owned(),
      snapshot: input.snapshot,
      evidence_refs,
    };

    let (report, _entry) = self.store.insert_report(new, audit).await.map_err(|e| {
      tracing::error!(error = %e, %report_id, target_path, "report insert failed");
      Error::downstream(e)
    })?;

    tracing::info!(
      %report_id,
      target_path = %report.target_path,
      anonymous = report.created_by.is_none(),
      "moderation report filed"
    );
    Ok(report)
  }

  /// Open reports, newest first.
  pub async fn list_open(&self, limit: usize, actor: &Actor) -> Result<Vec<ModerationReport>> {
    actor.require_elevated()?;
    if limit == 0 {
      return Err(Error::Validation("limit must be at least 1".into()));
    }
    self
      .store
      .list_open_reports(limit.min(MAX_LIST_LIMIT))
      .await
      .map_err(Error::downstream)
  }

  pub async fn get(&self, report_id: Uuid, actor: &Actor) -> Result<ModerationReport> {
    actor.require_elevated()?;
    self
      .store
      .get_report(report_id)
      .await
      .map_err(Error::downstream)?
      .ok_or_else(|| Error::NotFound(format!("report {report_id}")))
  }

  /// Move a report to `resolved`. Calling this on an already resolved report
  /// returns the stored report and writes nothing.
  pub async fn resolve(&self, report_id: Uuid, actor: &Actor) -> Result<ModerationReport> {
    actor.require_elevated()?;

    let audit = NewAuditEntry::new(
      kind::MODERATION_RESOLVE,
      actor.subject_id(),
      json!({ "report_id": report_id }),
    );
    let outcome = self
      .store
      .resolve_report(report_id, actor.subject_id().map(str::to_owned), audit)
      .await
      .map_err(|e| {
        tracing::error!(error = %e, %report_id, "report resolve failed");
        Error::downstream(e)
      })?
      .ok_or_else(|| Error::NotFound(format!("report {report_id}")))?;

    match &outcome {
      ResolveOutcome::Resolved(_) => {
        tracing::info!(%report_id, actor = ?actor.subject_id(), "moderation report resolved");
      }
      ResolveOutcome::AlreadyResolved(_) => {
        tracing::debug!(%report_id, "report already resolved");
      }
    }
    Ok(outcome.into_report())
  }

  /// The current document at the report's target, or `None` if it has since
  /// been deleted.
  pub async fn fetch_target_snapshot(
    &self,
    report: &ModerationReport,
    actor: &Actor,
  ) -> Result<Option<serde_json::Value>> {
    actor.require_elevated()?;
    self
      .store
      .get_document(&report.target_path)
      .await
      .map_err(Error::downstream)
  }
}
