//! Test fixtures: an in-memory store, canned actors, and a store wrapper that
//! fails on demand.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use shelf_core::{
  audit::{AuditEntry, AuditFilter, NewAuditEntry},
  principal::{Actor, Claims, Principal},
  report::{ModerationReport, NewReport, ResolveOutcome},
  series::SeriesMapping,
  store::TrustStore,
  trending::{ScoreUpdate, TrendingEntity},
};
use shelf_store_sqlite::SqliteStore;
use uuid::Uuid;

pub async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
}

pub fn admin() -> Actor {
  Actor::Principal(Principal { subject_id: "admin".into(), elevated: true })
}

pub fn member() -> Actor {
  Actor::Principal(Principal { subject_id: "member".into(), elevated: false })
}

// ─── Failure injection ───────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FlakyError {
  #[error("injected failure")]
  Injected,
  #[error(transparent)]
  Inner(#[from] shelf_store_sqlite::Error),
}

/// Delegates to a real store; selected operations fail while their flag is
/// set.
pub struct FlakyStore {
  pub inner:        SqliteStore,
  pub fail_selects: AtomicBool,
  pub fail_commits: AtomicBool,
  pub fail_appends: AtomicBool,
}

impl FlakyStore {
  pub async fn new() -> Arc<Self> {
    Arc::new(Self {
      inner:        SqliteStore::open_in_memory().await.expect("in-memory store"),
      fail_selects: AtomicBool::new(false),
      fail_commits: AtomicBool::new(false),
      fail_appends: AtomicBool::new(false),
    })
  }

  fn check(flag: &AtomicBool) -> Result<(), FlakyError> {
    if flag.load(Ordering::SeqCst) { Err(FlakyError::Injected) } else { Ok(()) }
  }
}

impl TrustStore for FlakyStore {
  type Error = FlakyError;

  async fn get_document(&self, path: &str) -> Result<Option<serde_json::Value>, FlakyError> {
    Ok(self.inner.get_document(path).await?)
  }

  async fn put_document(&self, path: &str, body: serde_json::Value) -> Result<(), FlakyError> {
    Ok(self.inner.put_document(path, body).await?)
  }

  async fn delete_document(&self, path: &str) -> Result<bool, FlakyError> {
    Ok(self.inner.delete_document(path).await?)
  }

  async fn insert_report(
    &self,
    report: NewReport,
    audit: NewAuditEntry,
  ) -> Result<(ModerationReport, AuditEntry), FlakyError> {
    Self::check(&self.fail_appends)?;
    Ok(self.inner.insert_report(report, audit).await?)
  }

  async fn get_report(&self, id: Uuid) -> Result<Option<ModerationReport>, FlakyError> {
    Ok(self.inner.get_report(id).await?)
  }

  async fn list_open_reports(&self, limit: usize) -> Result<Vec<ModerationReport>, FlakyError> {
    Ok(self.inner.list_open_reports(limit).await?)
  }

  async fn resolve_report(
    &self,
    id: Uuid,
    resolved_by: Option<String>,
    audit: NewAuditEntry,
  ) -> Result<Option<ResolveOutcome>, FlakyError> {
    Self::check(&self.fail_appends)?;
    Ok(self.inner.resolve_report(id, resolved_by, audit).await?)
  }

  async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry, FlakyError> {
    Self::check(&self.fail_appends)?;
    Ok(self.inner.append_audit(entry).await?)
  }

  async fn query_audit(
    &self,
    filter: &AuditFilter,
    limit: usize,
  ) -> Result<Vec<AuditEntry>, FlakyError> {
    Ok(self.inner.query_audit(filter, limit).await?)
  }

  async fn get_claims(&self, subject_id: &str) -> Result<Option<Claims>, FlakyError> {
    Ok(self.inner.get_claims(subject_id).await?)
  }

  async fn set_claims(
    &self,
    subject_id: String,
    elevated: bool,
    audit: NewAuditEntry,
  ) -> Result<(Claims, AuditEntry), FlakyError> {
    Self::check(&self.fail_appends)?;
    Ok(self.inner.set_claims(subject_id, elevated, audit).await?)
  }

  async fn increment_trending(
    &self,
    entity_id: String,
    delta: f64,
  ) -> Result<TrendingEntity, FlakyError> {
    Ok(self.inner.increment_trending(entity_id, delta).await?)
  }

  async fn get_trending(&self, entity_id: &str) -> Result<Option<TrendingEntity>, FlakyError> {
    Ok(self.inner.get_trending(entity_id).await?)
  }

  async fn select_trending_above(
    &self,
    threshold: f64,
    limit: usize,
  ) -> Result<Vec<TrendingEntity>, FlakyError> {
    Self::check(&self.fail_selects)?;
    Ok(self.inner.select_trending_above(threshold, limit).await?)
  }

  async fn commit_trending_batch(&self, updates: Vec<ScoreUpdate>) -> Result<usize, FlakyError> {
    Self::check(&self.fail_commits)?;
    Ok(self.inner.commit_trending_batch(updates).await?)
  }

  async fn replace_series_mapping(
    &self,
    series_id: String,
    links: Vec<(String, Option<String>)>,
  ) -> Result<SeriesMapping, FlakyError> {
    Self::check(&self.fail_commits)?;
    Ok(self.inner.replace_series_mapping(series_id, links).await?)
  }

  async fn get_series_mapping(&self, series_id: &str) -> Result<Option<SeriesMapping>, FlakyError> {
    Ok(self.inner.get_series_mapping(series_id).await?)
  }
}
