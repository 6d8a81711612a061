//! Integration tests for `SqliteStore` against an in-memory database.

use serde_json::json;
use shelf_core::{
  audit::{AuditFilter, NewAuditEntry, kind},
  report::{NewReport, ReportStatus, ResolveOutcome},
  store::TrustStore,
  trending::ScoreUpdate,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_report(target: &str) -> NewReport {
  NewReport {
    report_id:     Uuid::new_v4(),
    created_by:    Some("reader-1".into()),
    target_path:   target.into(),
    reason:        "spoilers in the first line".into(),
    snapshot:      Some(json!({ "body": "the butler did it" })),
    evidence_refs: vec!["screenshots/1.png".into()],
  }
}

fn report_audit(id: Uuid) -> NewAuditEntry {
  NewAuditEntry::new(kind::MODERATION_REPORT, Some("reader-1"), json!({ "report_id": id }))
}

fn resolve_audit(id: Uuid) -> NewAuditEntry {
  NewAuditEntry::new(kind::MODERATION_RESOLVE, Some("mod-1"), json!({ "report_id": id }))
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn document_put_get_delete() {
  let s = store().await;
  assert!(s.get_document("reviews/1").await.unwrap().is_none());

  s.put_document("reviews/1", json!({ "stars": 4 })).await.unwrap();
  s.put_document("reviews/1", json!({ "stars": 2 })).await.unwrap();
  assert_eq!(s.get_document("reviews/1").await.unwrap(), Some(json!({ "stars": 2 })));

  assert!(s.delete_document("reviews/1").await.unwrap());
  assert!(!s.delete_document("reviews/1").await.unwrap());
  assert!(s.get_document("reviews/1").await.unwrap().is_none());
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_report_round_trips_and_audits() {
  let s = store().await;
  let input = new_report("reviews/42");
  let id = input.report_id;

  let (report, entry) = s.insert_report(input, report_audit(id)).await.unwrap();
  assert_eq!(report.status, ReportStatus::Open);
  assert_eq!(entry.kind, kind::MODERATION_REPORT);

  let fetched = s.get_report(id).await.unwrap().unwrap();
  assert_eq!(fetched, report);

  let audit = s.query_audit(&AuditFilter::default(), 10).await.unwrap();
  assert_eq!(audit, vec![entry]);
}

#[tokio::test]
async fn get_report_missing_returns_none() {
  let s = store().await;
  assert!(s.get_report(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_open_reports_newest_first_and_bounded() {
  let s = store().await;
  let mut ids = vec![];
  for i in 0..3 {
    let input = new_report(&format!("reviews/{i}"));
    ids.push(input.report_id);
    s.insert_report(input, report_audit(ids[i])).await.unwrap();
  }

  let open = s.list_open_reports(10).await.unwrap();
  let listed: Vec<Uuid> = open.iter().map(|r| r.report_id).collect();
  assert_eq!(listed, vec![ids[2], ids[1], ids[0]]);

  let bounded = s.list_open_reports(2).await.unwrap();
  assert_eq!(bounded.len(), 2);
  assert_eq!(bounded[0].report_id, ids[2]);
}

#[tokio::test]
async fn resolve_transitions_once() {
  let s = store().await;
  let input = new_report("reviews/7");
  let id = input.report_id;
  s.insert_report(input, report_audit(id)).await.unwrap();

  let first = s
    .resolve_report(id, Some("mod-1".into()), resolve_audit(id))
    .await
    .unwrap()
    .unwrap();
  let ResolveOutcome::Resolved(resolved) = first else {
    panic!("first resolve must transition");
  };
  assert_eq!(resolved.status, ReportStatus::Resolved);
  assert_eq!(resolved.resolved_by.as_deref(), Some("mod-1"));
  assert!(resolved.resolved_at.is_some());

  let second = s
    .resolve_report(id, Some("mod-2".into()), resolve_audit(id))
    .await
    .unwrap()
    .unwrap();
  let ResolveOutcome::AlreadyResolved(again) = second else {
    panic!("second resolve must be a no-op");
  };
  assert_eq!(again, resolved);

  let filter = AuditFilter { kind: Some(kind::MODERATION_RESOLVE.into()), ..Default::default() };
  assert_eq!(s.query_audit(&filter, 10).await.unwrap().len(), 1);

  assert!(s.list_open_reports(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn resolve_missing_returns_none() {
  let s = store().await;
  let id = Uuid::new_v4();
  assert!(s.resolve_report(id, None, resolve_audit(id)).await.unwrap().is_none());
  assert!(s.query_audit(&AuditFilter::default(), 10).await.unwrap().is_empty());
}

// ─── Audit ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_query_filters_and_orders() {
  let s = store().await;
  let a = s
    .append_audit(NewAuditEntry::new("claim.set", Some("admin"), json!({})))
    .await
    .unwrap();
  let b = s
    .append_audit(NewAuditEntry::new("moderation.report", None, json!({})).with_note("anon"))
    .await
    .unwrap();
  let c = s
    .append_audit(NewAuditEntry::new("claim.set", Some("other"), json!({})))
    .await
    .unwrap();

  let all = s.query_audit(&AuditFilter::default(), 10).await.unwrap();
  assert_eq!(all, vec![c.clone(), b.clone(), a.clone()]);

  let claims = AuditFilter { kind: Some("claim.set".into()), ..Default::default() };
  assert_eq!(s.query_audit(&claims, 10).await.unwrap(), vec![c.clone(), a.clone()]);

  let by_admin = AuditFilter {
    kind:  Some("claim.set".into()),
    actor: Some("admin".into()),
    ..Default::default()
  };
  assert_eq!(s.query_audit(&by_admin, 10).await.unwrap(), vec![a.clone()]);

  let future = AuditFilter { since: Some(c.at + chrono::Duration::seconds(1)), ..Default::default() };
  assert!(s.query_audit(&future, 10).await.unwrap().is_empty());

  let before_all = AuditFilter { until: Some(a.at), ..Default::default() };
  assert!(s.query_audit(&before_all, 10).await.unwrap().is_empty());

  assert_eq!(s.query_audit(&AuditFilter::default(), 1).await.unwrap(), vec![c]);
  assert_eq!(b.note.as_deref(), Some("anon"));
}

// ─── Claims ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn claims_upsert_with_audit() {
  let s = store().await;
  assert!(s.get_claims("alice").await.unwrap().is_none());

  let audit = NewAuditEntry::new(kind::CLAIM_SET, None, json!({ "subject_id": "alice" }));
  let (claims, _) = s.set_claims("alice".into(), true, audit.clone()).await.unwrap();
  assert!(claims.elevated);
  assert_eq!(s.get_claims("alice").await.unwrap(), Some(claims));

  s.set_claims("alice".into(), false, audit).await.unwrap();
  assert!(!s.get_claims("alice").await.unwrap().unwrap().elevated);

  let filter = AuditFilter { kind: Some(kind::CLAIM_SET.into()), ..Default::default() };
  assert_eq!(s.query_audit(&filter, 10).await.unwrap().len(), 2);
}

// ─── Trending ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn increment_creates_and_clamps_at_zero() {
  let s = store().await;
  let e = s.increment_trending("book-1".into(), 3.5).await.unwrap();
  assert_eq!(e.trending_score, 3.5);
  let e = s.increment_trending("book-1".into(), 1.5).await.unwrap();
  assert_eq!(e.trending_score, 5.0);
  let e = s.increment_trending("book-1".into(), -10.0).await.unwrap();
  assert_eq!(e.trending_score, 0.0);
  assert!(s.increment_trending("book-1".into(), f64::NAN).await.is_err());
}

#[tokio::test]
async fn select_above_threshold_prefers_never_decayed() {
  let s = store().await;
  s.increment_trending("a".into(), 10.0).await.unwrap();
  s.increment_trending("b".into(), 10.0).await.unwrap();
  s.increment_trending("low".into(), 0.4).await.unwrap();

  let applied = s
    .commit_trending_batch(vec![ScoreUpdate {
      entity_id:      "a".into(),
      expected_score: 10.0,
      new_score:      9.0,
    }])
    .await
    .unwrap();
  assert_eq!(applied, 1);

  let picked = s.select_trending_above(0.5, 10).await.unwrap();
  let ids: Vec<&str> = picked.iter().map(|e| e.entity_id.as_str()).collect();
  assert_eq!(ids, vec!["b", "a"]);

  let one = s.select_trending_above(0.5, 1).await.unwrap();
  assert_eq!(one[0].entity_id, "b");
}

#[tokio::test]
async fn batch_skips_stale_updates() {
  let s = store().await;
  s.increment_trending("a".into(), 10.0).await.unwrap();
  s.increment_trending("b".into(), 10.0).await.unwrap();

  // `b` was bumped after it was read.
  s.increment_trending("b".into(), 1.0).await.unwrap();

  let applied = s
    .commit_trending_batch(vec![
      ScoreUpdate { entity_id: "a".into(), expected_score: 10.0, new_score: 9.0 },
      ScoreUpdate { entity_id: "b".into(), expected_score: 10.0, new_score: 9.0 },
    ])
    .await
    .unwrap();
  assert_eq!(applied, 1);

  assert_eq!(s.get_trending("a").await.unwrap().unwrap().trending_score, 9.0);
  let b = s.get_trending("b").await.unwrap().unwrap();
  assert_eq!(b.trending_score, 11.0);
  assert!(b.decayed_at.is_none());
}

#[tokio::test]
async fn batch_rejects_negative_scores_without_writing() {
  let s = store().await;
  s.increment_trending("a".into(), 10.0).await.unwrap();

  let result = s
    .commit_trending_batch(vec![
      ScoreUpdate { entity_id: "a".into(), expected_score: 10.0, new_score: 9.0 },
      ScoreUpdate { entity_id: "a".into(), expected_score: 9.0, new_score: -1.0 },
    ])
    .await;
  assert!(result.is_err());
  assert_eq!(s.get_trending("a").await.unwrap().unwrap().trending_score, 10.0);
}

// ─── Series ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn series_mapping_replaced_wholesale() {
  let s = store().await;
  assert!(s.get_series_mapping("s1").await.unwrap().is_none());

  let first = s
    .replace_series_mapping(
      "s1".into(),
      vec![
        ("a".into(), Some("b".into())),
        ("b".into(), Some("c".into())),
        ("c".into(), None),
      ],
    )
    .await
    .unwrap();
  assert_eq!(s.get_series_mapping("s1").await.unwrap(), Some(first));

  let second = s
    .replace_series_mapping("s1".into(), vec![("c".into(), Some("a".into())), ("a".into(), None)])
    .await
    .unwrap();
  let stored = s.get_series_mapping("s1").await.unwrap().unwrap();
  assert_eq!(stored, second);
  assert_eq!(stored.next_of.len(), 2);
  assert!(!stored.next_of.contains_key("b"));
}

#[tokio::test]
async fn empty_series_mapping_is_stored() {
  let s = store().await;
  s.replace_series_mapping("s1".into(), vec![("a".into(), None)]).await.unwrap();
  let cleared = s.replace_series_mapping("s1".into(), vec![]).await.unwrap();
  let stored = s.get_series_mapping("s1").await.unwrap().unwrap();
  assert_eq!(stored, cleared);
  assert!(stored.next_of.is_empty());
}
