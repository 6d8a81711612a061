//! SQL schema for the Shelf SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Opaque content owned by the wider application, addressed by path.
CREATE TABLE IF NOT EXISTS documents (
    path        TEXT PRIMARY KEY,
    body_json   TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Reports are never deleted. The only UPDATE ever issued moves
-- status from 'open' to 'resolved'.
CREATE TABLE IF NOT EXISTS reports (
    report_id      TEXT PRIMARY KEY,
    created_at     TEXT NOT NULL,   -- RFC 3339 UTC, fixed microsecond width
    created_by     TEXT,            -- NULL for anonymous reporters
    target_path    TEXT NOT NULL,
    reason         TEXT NOT NULL,
    snapshot_json  TEXT,
    evidence_refs  TEXT NOT NULL DEFAULT '[]',
    status         TEXT NOT NULL DEFAULT 'open',   -- 'open' | 'resolved'
    resolved_at    TEXT,
    resolved_by    TEXT,
    CHECK (status IN ('open', 'resolved'))
);

-- Strictly append-only. No UPDATE or DELETE is ever issued.
CREATE TABLE IF NOT EXISTS audit_entries (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id      TEXT NOT NULL UNIQUE,
    at            TEXT NOT NULL,
    actor         TEXT,
    kind          TEXT NOT NULL,
    context_json  TEXT NOT NULL,
    note          TEXT
);

CREATE TABLE IF NOT EXISTS claims (
    subject_id  TEXT PRIMARY KEY,
    elevated    INTEGER NOT NULL DEFAULT 0,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS trending (
    entity_id       TEXT PRIMARY KEY,
    trending_score  REAL NOT NULL DEFAULT 0 CHECK (trending_score >= 0),
    decayed_at      TEXT
);

CREATE TABLE IF NOT EXISTS series (
    series_id    TEXT PRIMARY KEY,
    computed_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS series_links (
    series_id  TEXT NOT NULL REFERENCES series(series_id),
    position   INTEGER NOT NULL,
    entity_id  TEXT NOT NULL,
    next_id    TEXT,
    PRIMARY KEY (series_id, entity_id)
);

CREATE INDEX IF NOT EXISTS reports_open_idx    ON reports(status, created_at);
CREATE INDEX IF NOT EXISTS audit_kind_idx      ON audit_entries(kind);
CREATE INDEX IF NOT EXISTS audit_actor_idx     ON audit_entries(actor);
CREATE INDEX IF NOT EXISTS trending_score_idx  ON trending(trending_score);

PRAGMA user_version = 1;
";
