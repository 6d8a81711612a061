//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings with a fixed microsecond
//! width, so lexical order in SQL equals chronological order. Structured
//! fields (snapshots, evidence refs, audit context) are stored as compact
//! JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use shelf_core::{
  audit::AuditEntry,
  principal::Claims,
  report::{ModerationReport, ReportStatus},
  trending::TrendingEntity,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The store's clock. Truncated to the precision that survives a round trip
/// through [`encode_dt`].
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── ReportStatus ────────────────────────────────────────────────────────────

pub fn encode_status(s: ReportStatus) -> &'static str { s.as_str() }

pub fn decode_status(s: &str) -> Result<ReportStatus> {
  match s {
    "open" => Ok(ReportStatus::Open),
    "resolved" => Ok(ReportStatus::Resolved),
    other => Err(Error::UnknownValue { column: "status", value: other.to_owned() }),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_json(v: &serde_json::Value) -> String { v.to_string() }

pub fn decode_json(s: &str) -> Result<serde_json::Value> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_refs(refs: &[String]) -> Result<String> {
  Ok(serde_json::to_string(refs)?)
}

pub fn decode_refs(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `reports` row.
pub struct RawReport {
  pub report_id:     String,
  pub created_at:    String,
  pub created_by:    Option<String>,
  pub target_path:   String,
  pub reason:        String,
  pub snapshot_json: Option<String>,
  pub evidence_refs: String,
  pub status:        String,
  pub resolved_at:   Option<String>,
  pub resolved_by:   Option<String>,
}

/// Column list matching [`RawReport::from_row`].
pub const REPORT_COLUMNS: &str = "report_id, created_at, created_by, target_path, reason, \
   snapshot_json, evidence_refs, status, resolved_at, resolved_by";

impl RawReport {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      report_id:     row.get(0)?,
      created_at:    row.get(1)?,
      created_by:    row.get(2)?,
      target_path:   row.get(3)?,
      reason:        row.get(4)?,
      snapshot_json: row.get(5)?,
      evidence_refs: row.get(6)?,
      status:        row.get(7)?,
      resolved_at:   row.get(8)?,
      resolved_by:   row.get(9)?,
    })
  }

  pub fn into_report(self) -> Result<ModerationReport> {
    Ok(ModerationReport {
      report_id:     decode_uuid(&self.report_id)?,
      created_at:    decode_dt(&self.created_at)?,
      created_by:    self.created_by,
      target_path:   self.target_path,
      reason:        self.reason,
      snapshot:      self.snapshot_json.as_deref().map(decode_json).transpose()?,
      evidence_refs: decode_refs(&self.evidence_refs)?,
      status:        decode_status(&self.status)?,
      resolved_at:   self.resolved_at.as_deref().map(decode_dt).transpose()?,
      resolved_by:   self.resolved_by,
    })
  }
}

/// Raw strings read directly from an `audit_entries` row.
pub struct RawAuditEntry {
  pub entry_id:     String,
  pub at:           String,
  pub actor:        Option<String>,
  pub kind:         String,
  pub context_json: String,
  pub note:         Option<String>,
}

pub const AUDIT_COLUMNS: &str = "entry_id, at, actor, kind, context_json, note";

impl RawAuditEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:     row.get(0)?,
      at:           row.get(1)?,
      actor:        row.get(2)?,
      kind:         row.get(3)?,
      context_json: row.get(4)?,
      note:         row.get(5)?,
    })
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      entry_id: decode_uuid(&self.entry_id)?,
      at:       decode_dt(&self.at)?,
      actor:    self.actor,
      kind:     self.kind,
      context:  decode_json(&self.context_json)?,
      note:     self.note,
    })
  }
}

/// Raw values read directly from a `claims` row.
pub struct RawClaims {
  pub subject_id: String,
  pub elevated:   bool,
  pub updated_at: String,
}

impl RawClaims {
  pub fn into_claims(self) -> Result<Claims> {
    Ok(Claims {
      subject_id: self.subject_id,
      elevated:   self.elevated,
      updated_at: Some(decode_dt(&self.updated_at)?),
    })
  }
}

/// Raw values read directly from a `trending` row.
pub struct RawTrending {
  pub entity_id:      String,
  pub trending_score: f64,
  pub decayed_at:     Option<String>,
}

pub const TRENDING_COLUMNS: &str = "entity_id, trending_score, decayed_at";

impl RawTrending {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:      row.get(0)?,
      trending_score: row.get(1)?,
      decayed_at:     row.get(2)?,
    })
  }

  pub fn into_entity(self) -> Result<TrendingEntity> {
    Ok(TrendingEntity {
      entity_id:      self.entity_id,
      trending_score: self.trending_score,
      decayed_at:     self.decayed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

// ─── Outgoing audit rows ─────────────────────────────────────────────────────

/// Pre-encoded audit values, ready to move into a connection closure.
pub struct AuditRow {
  pub entry_id:     String,
  pub at:           String,
  pub actor:        Option<String>,
  pub kind:         String,
  pub context_json: String,
  pub note:         Option<String>,
}

impl AuditRow {
  pub fn encode(entry: &AuditEntry) -> Self {
    Self {
      entry_id:     encode_uuid(entry.entry_id),
      at:           encode_dt(entry.at),
      actor:        entry.actor.clone(),
      kind:         entry.kind.clone(),
      context_json: encode_json(&entry.context),
      note:         entry.note.clone(),
    }
  }

  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO audit_entries (entry_id, at, actor, kind, context_json, note)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      rusqlite::params![
        self.entry_id,
        self.at,
        self.actor,
        self.kind,
        self.context_json,
        self.note,
      ],
    )?;
    Ok(())
  }
}
