//! SQL schema for the defect store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS defects (
    org                 TEXT NOT NULL,
    number              TEXT NOT NULL,
    repo                TEXT NOT NULL,
    title               TEXT NOT NULL,
    status              TEXT NOT NULL,   -- platform status name, e.g. '已完成'
    kernel              TEXT NOT NULL DEFAULT '',
    component           TEXT NOT NULL DEFAULT '',
    component_version   TEXT NOT NULL DEFAULT '',
    system_version      TEXT,
    description         TEXT NOT NULL DEFAULT '',
    reference_url       TEXT,
    guidance_url        TEXT,
    influence           TEXT NOT NULL DEFAULT '',
    severity_level      TEXT,            -- 'Low' | 'Moderate' | 'High' | 'Critical'
    root_cause          TEXT NOT NULL DEFAULT '',
    affected_version    TEXT NOT NULL DEFAULT '[]',  -- JSON array of versions
    fixed_version       TEXT NOT NULL DEFAULT '[]',
    unpublished_version TEXT NOT NULL DEFAULT '[]',
    abi                 TEXT NOT NULL DEFAULT '',
    created_at          TEXT NOT NULL,   -- RFC 3339 UTC
    updated_at          TEXT NOT NULL,
    PRIMARY KEY (org, number)
);

CREATE INDEX IF NOT EXISTS defects_status_idx ON defects(status);

PRAGMA user_version = 1;
";
