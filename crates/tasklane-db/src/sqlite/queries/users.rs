use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use tasklane_core::user::User;

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    /// Insert a user. A taken username surfaces as `DbError::Conflict`.
    pub fn create_user_sync(&self, username: &str, password_hash: &str) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![username, password_hash, now],
            )
            .map_err(|e| match super::super::map_sqlite_err(e) {
                DbError::Conflict(_) => DbError::Conflict(format!("username {username}")),
                other => other,
            })?;
            Ok(User {
                id: conn.last_insert_rowid(),
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                created_at: now,
            })
        })
    }

    pub fn find_user_by_username_sync(&self, username: &str) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .optional()
            .to_db()
        })
    }

    pub fn get_user_sync(&self, id: i64) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
                .optional()
                .to_db()
        })
    }
}
