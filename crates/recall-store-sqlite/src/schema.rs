//! SQL schema for the Recall SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS cards (
    card_id         TEXT PRIMARY KEY,
    question        TEXT NOT NULL,
    answer          TEXT NOT NULL,
    review_count    INTEGER NOT NULL DEFAULT 0,
    next_review_at  TEXT,            -- RFC 3339 UTC; read leniently
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS review_rules (
    review_count   INTEGER PRIMARY KEY,
    interval_days  INTEGER NOT NULL CHECK (interval_days >= 1)
);

-- Opaque JSON documents: progress snapshot, scheduler settings.
CREATE TABLE IF NOT EXISTS kv (
    key         TEXT PRIMARY KEY,
    value_json  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS cards_created_idx ON cards(created_at);

PRAGMA user_version = 1;
";
