//! SQL schema for the divvy SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Keyed by phone number: one row per subscriber, duplicates impossible.
CREATE TABLE IF NOT EXISTS subscribers (
    phone               TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    subscriptions       TEXT NOT NULL DEFAULT '',  -- ';'-joined canonical entries
    debtor              INTEGER NOT NULL DEFAULT 0,
    override_expiration INTEGER NOT NULL DEFAULT 0,
    deleted             INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,             -- ISO 8601 UTC; server-assigned
    last_seen_at        TEXT,
    version             INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    credential_id TEXT PRIMARY KEY,
    service       TEXT NOT NULL,
    login         TEXT NOT NULL,
    secret        TEXT NOT NULL,
    published_at  TEXT NOT NULL,
    visible       INTEGER NOT NULL DEFAULT 1,
    version       INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS subscribers_deleted_idx ON subscribers(deleted);
CREATE INDEX IF NOT EXISTS credentials_service_idx ON credentials(service);

PRAGMA user_version = 1;
";
