//! Privilege claims. The elevated claim is what moderation, audit queries,
//! and manual job triggers require.

use std::sync::Arc;

use serde_json::json;
use shelf_core::{
  Error, Result,
  audit::{NewAuditEntry, kind},
  principal::{Actor, Claims, Principal},
  store::TrustStore,
};

pub struct ClaimRegistry<S> {
  store: Arc<S>,
}

impl<S> Clone for ClaimRegistry<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: TrustStore> ClaimRegistry<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Resolve a verified subject into a principal with its current claims.
  pub async fn principal(&self, subject_id: &str) -> Result<Principal> {
    let claims = self
      .store
      .get_claims(subject_id)
      .await
      .map_err(Error::downstream)?
      .unwrap_or_else(|| Claims::unprivileged(subject_id));
    Ok(claims.into())
  }

  /// Grant or revoke the elevated claim. Always appends a `claim.set` entry,
  /// even when the value does not change.
  pub async fn set_elevated_claim(
    &self,
    subject_id: &str,
    elevated: bool,
    actor: &Actor,
  ) -> Result<Claims> {
    self.write(subject_id, elevated, actor, None).await
  }

  /// Elevate each configured admin subject that is not elevated yet.
  /// Returns how many were granted.
  pub async fn bootstrap(&self, subject_ids: &[String]) -> Result<usize> {
    let mut granted = 0;
    for subject_id in subject_ids {
      if self.principal(subject_id).await?.elevated {
        continue;
      }
      self.write(subject_id, true, &Actor::System, Some("bootstrap")).await?;
      granted += 1;
    }
    Ok(granted)
  }

  async fn write(
    &self,
    subject_id: &str,
    elevated: bool,
    actor: &Actor,
    note: Option<&str>,
  ) -> Result<Claims> {
    actor.require_elevated()?;
    let subject_id = subject_id.trim();
    if subject_id.is_empty() {
      return Err(Error::Validation("subject_id must not be empty".into()));
    }

    let mut audit = NewAuditEntry::new(
      kind::CLAIM_SET,
      actor.subject_id(),
      json!({ "subject_id": subject_id, "elevated": elevated }),
    );
    if let Some(note) = note {
      audit = audit.with_note(note);
    }

    let (claims, _entry) = self
      .store
      .set_claims(subject_id.to_owned(), elevated, audit)
      .await
      .map_err(|e| {
        tracing::error!(error = %e, subject_id, "claim write failed");
        Error::downstream(e)
      })?;

    tracing::info!(subject_id, elevated, actor = ?actor.subject_id(), "claim set");
    Ok(claims)
  }
}
