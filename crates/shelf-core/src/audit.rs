//! Audit entries: the system of record for "who did what, when".
//!
//! Entries are strictly append-only: nothing ever updates or deletes one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known entry kinds.
pub mod kind {
  pub const CLAIM_SET: &str = "claim.set";
  pub const MODERATION_REPORT: &str = "moderation.report";
  pub const MODERATION_RESOLVE: &str = "moderation.resolve";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub entry_id: Uuid,
  /// Server-assigned.
  pub at:       DateTime<Utc>,
  /// `None` when the system itself acted.
  pub actor:    Option<String>,
  pub kind:     String,
  pub context:  serde_json::Value,
  pub note:     Option<String>,
}

/// Input to the store's append operations. `entry_id` and `at` are assigned
/// by the store.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub actor:   Option<String>,
  pub kind:    String,
  pub context: serde_json::Value,
  pub note:    Option<String>,
}

impl NewAuditEntry {
  pub fn new(
    kind: impl Into<String>,
    actor: Option<&str>,
    context: serde_json::Value,
  ) -> Self {
    Self {
      actor: actor.map(str::to_owned),
      kind: kind.into(),
      context,
      note: None,
    }
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.note = Some(note.into());
    self
  }
}

/// Parameters for [`crate::store::TrustStore::query_audit`]. All filters are
/// conjunctive; `since` is inclusive, `until` exclusive.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
  pub kind:  Option<String>,
  pub actor: Option<String>,
  pub since: Option<DateTime<Utc>>,
  pub until: Option<DateTime<Utc>>,
}
