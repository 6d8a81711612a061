//! The append-only audit trail.

use std::sync::Arc;

use shelf_core::{
  Error, Result,
  audit::{AuditEntry, AuditFilter, NewAuditEntry},
  principal::Actor,
  store::TrustStore,
};

/// Upper bound on entries returned by one query.
pub const MAX_QUERY_LIMIT: usize = 500;

pub struct AuditLog<S> {
  store: Arc<S>,
}

impl<S> Clone for AuditLog<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: TrustStore> AuditLog<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Append an entry. Losing an audit record is itself a security event, so
  /// a store failure is logged and returned, never swallowed.
  pub async fn record(
    &self,
    kind: &str,
    actor: &Actor,
    context: serde_json::Value,
    note: Option<String>,
  ) -> Result<AuditEntry> {
    let mut input = NewAuditEntry::new(kind, actor.subject_id(), context);
    input.note = note;

    self.store.append_audit(input).await.map_err(|e| {
      tracing::error!(error = %e, kind, actor = ?actor.subject_id(), "audit append failed");
      Error::downstream(e)
    })
  }

  /// Entries matching `filter`, most recent first. Elevated callers only.
  pub async fn query(
    &self,
    filter: &AuditFilter,
    limit: usize,
    caller: &Actor,
  ) -> Result<Vec<AuditEntry>> {
    caller.require_elevated()?;
    if limit == 0 || limit > MAX_QUERY_LIMIT {
      return Err(Error::Validation(format!("limit must be between 1 and {MAX_QUERY_LIMIT}")));
    }
    if let (Some(since), Some(until)) = (filter.since, filter.until)
      && since >= until
    {
      return Err(Error::Validation("since must be earlier than until".into()));
    }

    self.store.query_audit(filter, limit).await.map_err(Error::downstream)
  }
}
