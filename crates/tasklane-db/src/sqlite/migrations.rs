use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        // v1: tasks and their attachments
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 title       TEXT NOT NULL,
                 description TEXT,
                 status      TEXT NOT NULL DEFAULT 'pending'
                                 CHECK(status IN ('pending','in-progress','completed')),
                 created_at  TEXT NOT NULL,
                 updated_at  TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at);

             CREATE TABLE IF NOT EXISTS attachments (
                 id            INTEGER PRIMARY KEY AUTOINCREMENT,
                 task_id       INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                 filename      TEXT NOT NULL,
                 original_name TEXT NOT NULL,
                 file_path     TEXT NOT NULL,
                 file_size     INTEGER NOT NULL DEFAULT 0,
                 mime_type     TEXT,
                 created_at    TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_attachments_task ON attachments(task_id);",
        )
        .to_db()?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'))",
            [],
        )
        .to_db()?;
    }

    if current_version < 2 {
        // v2: user accounts
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                 id            INTEGER PRIMARY KEY AUTOINCREMENT,
                 username      TEXT NOT NULL UNIQUE,
                 password_hash TEXT NOT NULL,
                 created_at    TEXT NOT NULL
             );",
        )
        .to_db()?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (2, datetime('now'))",
            [],
        )
        .to_db()?;
    }

    Ok(())
}
