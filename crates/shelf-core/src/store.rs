//! The `TrustStore` trait, the persistent-store port consumed by the
//! pipeline.
//!
//! The trait is implemented by storage backends (e.g. `shelf-store-sqlite`).
//! Services in `shelf-trust` depend on this abstraction, not on any concrete
//! backend. Every method that writes more than one record commits all of them
//! atomically or none of them.

use std::future::Future;

use uuid::Uuid;

use crate::{
  audit::{AuditEntry, AuditFilter, NewAuditEntry},
  principal::Claims,
  report::{ModerationReport, NewReport, ResolveOutcome},
  series::SeriesMapping,
  trending::{ScoreUpdate, TrendingEntity},
};

/// Abstraction over a Shelf persistent store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TrustStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Documents ─────────────────────────────────────────────────────────

  /// Point read of the document at `path`. Returns `None` if absent.
  fn get_document<'a>(
    &'a self,
    path: &'a str,
  ) -> impl Future<Output = Result<Option<serde_json::Value>, Self::Error>> + Send + 'a;

  /// Create or overwrite the document at `path`.
  fn put_document<'a>(
    &'a self,
    path: &'a str,
    body: serde_json::Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove the document at `path`. Returns whether it existed.
  fn delete_document<'a>(
    &'a self,
    path: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Moderation reports ────────────────────────────────────────────────

  /// Persist a new `open` report together with its audit entry.
  fn insert_report(
    &self,
    report: NewReport,
    audit: NewAuditEntry,
  ) -> impl Future<Output = Result<(ModerationReport, AuditEntry), Self::Error>> + Send + '_;

  /// Retrieve a report by id. Returns `None` if not found.
  fn get_report(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ModerationReport>, Self::Error>> + Send + '_;

  /// Open reports, most recently created first.
  fn list_open_reports(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<ModerationReport>, Self::Error>> + Send + '_;

  /// Transition a report from `open` to `resolved` and append `audit`, both
  /// in one write. The transition is conditional on the report still being
  /// open, so of two concurrent callers exactly one observes
  /// [`ResolveOutcome::Resolved`]. Returns `None` if the report does not
  /// exist.
  fn resolve_report(
    &self,
    id: Uuid,
    resolved_by: Option<String>,
    audit: NewAuditEntry,
  ) -> impl Future<Output = Result<Option<ResolveOutcome>, Self::Error>> + Send + '_;

  // ── Audit ─────────────────────────────────────────────────────────────

  /// Append a standalone audit entry.
  fn append_audit(
    &self,
    entry: NewAuditEntry,
  ) -> impl Future<Output = Result<AuditEntry, Self::Error>> + Send + '_;

  /// Entries matching `filter`, most recent first.
  fn query_audit<'a>(
    &'a self,
    filter: &'a AuditFilter,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send + 'a;

  // ── Claims ────────────────────────────────────────────────────────────

  /// Claims for `subject_id`, or `None` if none were ever set.
  fn get_claims<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Option<Claims>, Self::Error>> + Send + 'a;

  /// Write the elevated claim and append `audit` in one write.
  fn set_claims(
    &self,
    subject_id: String,
    elevated: bool,
    audit: NewAuditEntry,
  ) -> impl Future<Output = Result<(Claims, AuditEntry), Self::Error>> + Send + '_;

  // ── Trending ──────────────────────────────────────────────────────────

  /// Add `delta` to an entity's score, creating it at zero first if needed.
  /// This is the user-driven increment path; scores never go below zero.
  fn increment_trending(
    &self,
    entity_id: String,
    delta: f64,
  ) -> impl Future<Output = Result<TrendingEntity, Self::Error>> + Send + '_;

  fn get_trending<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Option<TrendingEntity>, Self::Error>> + Send + 'a;

  /// Up to `limit` entities with `trending_score > threshold`, least
  /// recently decayed first.
  fn select_trending_above(
    &self,
    threshold: f64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<TrendingEntity>, Self::Error>> + Send + '_;

  /// Apply a batch of score updates atomically. Updates whose
  /// `expected_score` no longer matches are skipped, not failed. Returns the
  /// number of updates applied.
  fn commit_trending_batch(
    &self,
    updates: Vec<ScoreUpdate>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Series ────────────────────────────────────────────────────────────

  /// Replace the whole stored mapping for `series_id` with `links`, given in
  /// reading order.
  fn replace_series_mapping(
    &self,
    series_id: String,
    links: Vec<(String, Option<String>)>,
  ) -> impl Future<Output = Result<SeriesMapping, Self::Error>> + Send + '_;

  /// The stored mapping, or `None` if the series was never linked.
  fn get_series_mapping<'a>(
    &'a self,
    series_id: &'a str,
  ) -> impl Future<Output = Result<Option<SeriesMapping>, Self::Error>> + Send + 'a;
}
