//! Database schema, applied idempotently at open.

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS personnel (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    station_id  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance_event (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    personnel_id  INTEGER NOT NULL REFERENCES personnel (id),
    kind          TEXT NOT NULL,
    disposition   TEXT NOT NULL DEFAULT 'confirmed',
    confidence    REAL,
    source        TEXT NOT NULL,
    captured_at   TEXT NOT NULL,
    created_by    INTEGER NOT NULL,
    modified_by   INTEGER,
    modified_at   TEXT
);

CREATE INDEX IF NOT EXISTS idx_attendance_alternator
    ON attendance_event (personnel_id, disposition, captured_at DESC, id DESC);

CREATE TABLE IF NOT EXISTS pending_review (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    personnel_id   INTEGER NOT NULL REFERENCES personnel (id),
    confidence     REAL NOT NULL,
    captured_at    TEXT NOT NULL,
    review_status  TEXT NOT NULL DEFAULT 'pending',
    reviewed_by    INTEGER,
    reviewed_at    TEXT
);

CREATE INDEX IF NOT EXISTS idx_pending_status
    ON pending_review (review_status, captured_at DESC);

CREATE TABLE IF NOT EXISTS activity_log (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id  INTEGER NOT NULL,
    action    TEXT NOT NULL,
    detail    TEXT,
    at        TEXT NOT NULL
);
"#;

pub(crate) fn ensure_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)
}
