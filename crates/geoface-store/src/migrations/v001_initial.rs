//! v001 -- Initial schema: users, face templates, office location, attendance.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    email         TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    role          TEXT NOT NULL CHECK (role IN ('employee', 'admin')),
    password_hash TEXT NOT NULL,               -- argon2 PHC string
    created_at    TEXT NOT NULL                -- RFC 3339
);

CREATE TABLE IF NOT EXISTS face_templates (
    id         TEXT PRIMARY KEY NOT NULL,
    user_id    TEXT NOT NULL,
    sequence   INTEGER NOT NULL,
    descriptor TEXT NOT NULL,                  -- JSON array of numbers
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_face_templates_user ON face_templates(user_id, sequence);

-- Single-row table: the CHECK pins the primary key so writes are upserts.
CREATE TABLE IF NOT EXISTS office_location (
    id         INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
    name       TEXT NOT NULL,
    latitude   REAL NOT NULL,
    longitude  REAL NOT NULL,
    radius     REAL NOT NULL CHECK (radius > 0),
    updated_by TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    id                 TEXT PRIMARY KEY NOT NULL,
    user_id            TEXT NOT NULL,
    date               TEXT NOT NULL,          -- YYYY-MM-DD (UTC)
    status             TEXT NOT NULL CHECK (status IN ('checked_in', 'checked_out')),
    check_in_time      TEXT,
    check_out_time     TEXT,
    check_in_lat       REAL,
    check_in_lon       REAL,
    check_out_lat      REAL,
    check_out_lon      REAL,
    face_match_score   REAL,
    created_at         TEXT NOT NULL,

    UNIQUE (user_id, date),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date DESC);

-- The ledger is append-only: closed days are frozen and nothing is deleted.
CREATE TRIGGER IF NOT EXISTS attendance_closed_is_frozen
BEFORE UPDATE ON attendance
WHEN OLD.status = 'checked_out'
BEGIN
    SELECT RAISE(ABORT, 'attendance record is closed');
END;

CREATE TRIGGER IF NOT EXISTS attendance_no_delete
BEFORE DELETE ON attendance
BEGIN
    SELECT RAISE(ABORT, 'attendance records cannot be deleted');
END;
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
