//! Moderation reports.
//!
//! A report is created `open` and can move to `resolved` exactly once. Reports
//! are never deleted; they stay as part of the audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
  Open,
  Resolved,
}

impl ReportStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Open => "open",
      Self::Resolved => "resolved",
    }
  }
}

/// A user-submitted report about content at `target_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationReport {
  pub report_id:     Uuid,
  /// Server-assigned; never changes after creation.
  pub created_at:    DateTime<Utc>,
  /// `None` for anonymous reporters.
  pub created_by:    Option<String>,
  /// Store path of the reported document, e.g. `reviews/8c1f…`.
  pub target_path:   String,
  pub reason:        String,
  /// The content as the reporter saw it. Opaque to the pipeline.
  pub snapshot:      Option<serde_json::Value>,
  pub evidence_refs: Vec<String>,
  pub status:        ReportStatus,
  pub resolved_at:   Option<DateTime<Utc>>,
  pub resolved_by:   Option<String>,
}

/// Input to [`crate::store::TrustStore::insert_report`].
/// `created_at` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewReport {
  pub report_id:     Uuid,
  pub created_by:    Option<String>,
  pub target_path:   String,
  pub reason:        String,
  pub snapshot:      Option<serde_json::Value>,
  pub evidence_refs: Vec<String>,
}

/// Result of a resolve attempt against the store.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
  /// This call performed the transition and appended the audit entry.
  Resolved(ModerationReport),
  /// The report was already resolved; nothing was written.
  AlreadyResolved(ModerationReport),
}

impl ResolveOutcome {
  pub fn into_report(self) -> ModerationReport {
    match self {
      Self::Resolved(r) | Self::AlreadyResolved(r) => r,
    }
  }
}
