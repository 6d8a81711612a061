//! [`SqliteStore`], the SQLite implementation of [`TrustStore`].

use std::{collections::BTreeMap, path::Path};

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use shelf_core::{
  audit::{AuditEntry, AuditFilter, NewAuditEntry},
  principal::Claims,
  report::{ModerationReport, NewReport, ReportStatus, ResolveOutcome},
  series::SeriesMapping,
  store::TrustStore,
  trending::{ScoreUpdate, TrendingEntity},
};

use crate::{
  encode::{
    AUDIT_COLUMNS, AuditRow, REPORT_COLUMNS, RawAuditEntry, RawClaims, RawReport,
    RawTrending, TRENDING_COLUMNS, decode_dt, decode_json, encode_dt, encode_json,
    encode_refs, encode_status, encode_uuid, now,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Shelf trust store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised onto one connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Build a fully-stamped audit entry from caller input.
fn stamp_audit(input: NewAuditEntry, at: chrono::DateTime<chrono::Utc>) -> AuditEntry {
  AuditEntry {
    entry_id: Uuid::new_v4(),
    at,
    actor:    input.actor,
    kind:     input.kind,
    context:  input.context,
    note:     input.note,
  }
}

fn read_report(
  conn: &rusqlite::Connection,
  id_str: &str,
) -> rusqlite::Result<Option<RawReport>> {
  conn
    .query_row(
      &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE report_id = ?1"),
      rusqlite::params![id_str],
      RawReport::from_row,
    )
    .optional()
}

// ─── TrustStore impl ─────────────────────────────────────────────────────────

impl TrustStore for SqliteStore {
  type Error = Error;

  // ── Documents ─────────────────────────────────────────────────────────────

  async fn get_document(&self, path: &str) -> Result<Option<serde_json::Value>> {
    let path = path.to_owned();

    let body: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT body_json FROM documents WHERE path = ?1",
            rusqlite::params![path],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    body.as_deref().map(decode_json).transpose()
  }

  async fn put_document(&self, path: &str, body: serde_json::Value) -> Result<()> {
    let path     = path.to_owned();
    let body_str = encode_json(&body);
    let at_str   = encode_dt(now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (path, body_json, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(path) DO UPDATE SET body_json = ?2, updated_at = ?3",
          rusqlite::params![path, body_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_document(&self, path: &str) -> Result<bool> {
    let path = path.to_owned();

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM documents WHERE path = ?1", rusqlite::params![path])?)
      })
      .await?;
    Ok(removed > 0)
  }

  // ── Moderation reports ────────────────────────────────────────────────────

  async fn insert_report(
    &self,
    input: NewReport,
    audit: NewAuditEntry,
  ) -> Result<(ModerationReport, AuditEntry)> {
    let at = now();
    let report = ModerationReport {
      report_id:     input.report_id,
      created_at:    at,
      created_by:    input.created_by,
      target_path:   input.target_path,
      reason:        input.reason,
      snapshot:      input.snapshot,
      evidence_refs: input.evidence_refs,
      status:        ReportStatus::Open,
      resolved_at:   None,
      resolved_by:   None,
    };
    let entry = stamp_audit(audit, at);

    let id_str       = encode_uuid(report.report_id);
    let at_str       = encode_dt(at);
    let created_by   = report.created_by.clone();
    let target_path  = report.target_path.clone();
    let reason       = report.reason.clone();
    let snapshot_str = report.snapshot.as_ref().map(encode_json);
    let refs_str     = encode_refs(&report.evidence_refs)?;
    let status_str   = encode_status(report.status);
    let audit_row    = AuditRow::encode(&entry);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO reports (
             report_id, created_at, created_by, target_path, reason,
             snapshot_json, evidence_refs, status
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            at_str,
            created_by,
            target_path,
            reason,
            snapshot_str,
            refs_str,
            status_str,
          ],
        )?;
        audit_row.insert(&tx)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok((report, entry))
  }

  async fn get_report(&self, id: Uuid) -> Result<Option<ModerationReport>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| Ok(read_report(conn, &id_str)?))
      .await?;

    raw.map(RawReport::into_report).transpose()
  }

  async fn list_open_reports(&self, limit: usize) -> Result<Vec<ModerationReport>> {
    let limit_val = limit as i64;

    let raws: Vec<RawReport> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REPORT_COLUMNS} FROM reports
           WHERE status = 'open'
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], RawReport::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReport::into_report).collect()
  }

  async fn resolve_report(
    &self,
    id: Uuid,
    resolved_by: Option<String>,
    audit: NewAuditEntry,
  ) -> Result<Option<ResolveOutcome>> {
    let at        = now();
    let id_str    = encode_uuid(id);
    let at_str    = encode_dt(at);
    let audit_row = AuditRow::encode(&stamp_audit(audit, at));

    let outcome: Option<(RawReport, bool)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(current) = read_report(&tx, &id_str)? else {
          return Ok(None);
        };
        if current.status != ReportStatus::Open.as_str() {
          return Ok(Some((current, false)));
        }

        // Conditional on the row still being open: the compare half of the
        // compare-and-swap.
        let changed = tx.execute(
          "UPDATE reports SET status = 'resolved', resolved_at = ?2, resolved_by = ?3
           WHERE report_id = ?1 AND status = 'open'",
          rusqlite::params![id_str, at_str, resolved_by],
        )?;
        if changed == 1 {
          audit_row.insert(&tx)?;
        }
        let updated = read_report(&tx, &id_str)?;
        tx.commit()?;
        Ok(updated.map(|r| (r, changed == 1)))
      })
      .await?;

    outcome
      .map(|(raw, transitioned)| {
        let report = raw.into_report()?;
        Ok(if transitioned {
          ResolveOutcome::Resolved(report)
        } else {
          ResolveOutcome::AlreadyResolved(report)
        })
      })
      .transpose()
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  async fn append_audit(&self, input: NewAuditEntry) -> Result<AuditEntry> {
    let entry = stamp_audit(input, now());
    let row   = AuditRow::encode(&entry);

    self
      .conn
      .call(move |conn| {
        row.insert(conn)?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn query_audit(&self, filter: &AuditFilter, limit: usize) -> Result<Vec<AuditEntry>> {
    // Build WHERE clause dynamically; every bound value is a string.
    let mut conds: Vec<&'static str> = vec![];
    let mut values: Vec<String> = vec![];
    if let Some(kind) = &filter.kind {
      conds.push("kind = ?");
      values.push(kind.clone());
    }
    if let Some(actor) = &filter.actor {
      conds.push("actor = ?");
      values.push(actor.clone());
    }
    if let Some(since) = filter.since {
      conds.push("at >= ?");
      values.push(encode_dt(since));
    }
    if let Some(until) = filter.until {
      conds.push("at < ?");
      values.push(encode_dt(until));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    let sql = format!(
      "SELECT {AUDIT_COLUMNS} FROM audit_entries
       {where_clause}
       ORDER BY seq DESC
       LIMIT {limit}"
    );

    let raws: Vec<RawAuditEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values.iter()), RawAuditEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEntry::into_entry).collect()
  }

  // ── Claims ────────────────────────────────────────────────────────────────

  async fn get_claims(&self, subject_id: &str) -> Result<Option<Claims>> {
    let subject_id = subject_id.to_owned();

    let raw: Option<RawClaims> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT subject_id, elevated, updated_at FROM claims WHERE subject_id = ?1",
            rusqlite::params![subject_id],
            |row| {
              Ok(RawClaims {
                subject_id: row.get(0)?,
                elevated:   row.get(1)?,
                updated_at: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawClaims::into_claims).transpose()
  }

  async fn set_claims(
    &self,
    subject_id: String,
    elevated: bool,
    audit: NewAuditEntry,
  ) -> Result<(Claims, AuditEntry)> {
    let at     = now();
    let entry  = stamp_audit(audit, at);
    let claims = Claims { subject_id: subject_id.clone(), elevated, updated_at: Some(at) };

    let at_str    = encode_dt(at);
    let audit_row = AuditRow::encode(&entry);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO claims (subject_id, elevated, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(subject_id) DO UPDATE SET elevated = ?2, updated_at = ?3",
          rusqlite::params![subject_id, elevated, at_str],
        )?;
        audit_row.insert(&tx)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok((claims, entry))
  }

  // ── Trending ──────────────────────────────────────────────────────────────

  async fn increment_trending(&self, entity_id: String, delta: f64) -> Result<TrendingEntity> {
    if !delta.is_finite() {
      return Err(Error::InvalidScore { entity_id, score: delta });
    }

    let raw: RawTrending = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO trending (entity_id, trending_score) VALUES (?1, MAX(?2, 0.0))
           ON CONFLICT(entity_id) DO UPDATE
             SET trending_score = MAX(trending_score + ?2, 0.0)",
          rusqlite::params![entity_id, delta],
        )?;
        Ok(conn.query_row(
          &format!("SELECT {TRENDING_COLUMNS} FROM trending WHERE entity_id = ?1"),
          rusqlite::params![entity_id],
          RawTrending::from_row,
        )?)
      })
      .await?;

    raw.into_entity()
  }

  async fn get_trending(&self, entity_id: &str) -> Result<Option<TrendingEntity>> {
    let entity_id = entity_id.to_owned();

    let raw: Option<RawTrending> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {TRENDING_COLUMNS} FROM trending WHERE entity_id = ?1"),
            rusqlite::params![entity_id],
            RawTrending::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawTrending::into_entity).transpose()
  }

  async fn select_trending_above(
    &self,
    threshold: f64,
    limit: usize,
  ) -> Result<Vec<TrendingEntity>> {
    let limit_val = limit as i64;

    // NULL `decayed_at` sorts first: never-decayed entities go before the
    // rest, then the least recently decayed.
    let raws: Vec<RawTrending> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TRENDING_COLUMNS} FROM trending
           WHERE trending_score > ?1
           ORDER BY decayed_at ASC, entity_id ASC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![threshold, limit_val], RawTrending::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTrending::into_entity).collect()
  }

  async fn commit_trending_batch(&self, updates: Vec<ScoreUpdate>) -> Result<usize> {
    if let Some(bad) = updates
      .iter()
      .find(|u| !u.new_score.is_finite() || u.new_score < 0.0)
    {
      return Err(Error::InvalidScore {
        entity_id: bad.entity_id.clone(),
        score:     bad.new_score,
      });
    }

    let at_str = encode_dt(now());

    let applied = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut applied = 0;
        {
          let mut stmt = tx.prepare(
            "UPDATE trending SET trending_score = ?1, decayed_at = ?2
             WHERE entity_id = ?3 AND trending_score = ?4",
          )?;
          for u in &updates {
            applied += stmt.execute(rusqlite::params![
              u.new_score,
              at_str,
              u.entity_id,
              u.expected_score,
            ])?;
          }
        }
        tx.commit()?;
        Ok(applied)
      })
      .await?;

    Ok(applied)
  }

  // ── Series ────────────────────────────────────────────────────────────────

  async fn replace_series_mapping(
    &self,
    series_id: String,
    links: Vec<(String, Option<String>)>,
  ) -> Result<SeriesMapping> {
    let at = now();
    let mapping = SeriesMapping {
      series_id:   series_id.clone(),
      next_of:     links.iter().cloned().collect(),
      computed_at: at,
    };
    let at_str = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO series (series_id, computed_at) VALUES (?1, ?2)
           ON CONFLICT(series_id) DO UPDATE SET computed_at = ?2",
          rusqlite::params![series_id, at_str],
        )?;
        tx.execute(
          "DELETE FROM series_links WHERE series_id = ?1",
          rusqlite::params![series_id],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO series_links (series_id, position, entity_id, next_id)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for (position, (entity_id, next_id)) in links.iter().enumerate() {
            stmt.execute(rusqlite::params![series_id, position as i64, entity_id, next_id])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(mapping)
  }

  async fn get_series_mapping(&self, series_id: &str) -> Result<Option<SeriesMapping>> {
    let series_id = series_id.to_owned();

    let raw: Option<(String, String, Vec<(String, Option<String>)>)> = self
      .conn
      .call(move |conn| {
        let computed_at: Option<String> = conn
          .query_row(
            "SELECT computed_at FROM series WHERE series_id = ?1",
            rusqlite::params![series_id],
            |row| row.get(0),
          )
          .optional()?;
        let Some(computed_at) = computed_at else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT entity_id, next_id FROM series_links
           WHERE series_id = ?1
           ORDER BY position ASC",
        )?;
        let links = stmt
          .query_map(rusqlite::params![series_id], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some((series_id, computed_at, links)))
      })
      .await?;

    raw
      .map(|(series_id, computed_at, links)| {
        Ok(SeriesMapping {
          series_id,
          next_of: links.into_iter().collect::<BTreeMap<_, _>>(),
          computed_at: decode_dt(&computed_at)?,
        })
      })
      .transpose()
  }
}
