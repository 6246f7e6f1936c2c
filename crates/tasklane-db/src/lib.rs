mod sqlite;

pub use sqlite::SqliteDatabase;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use tasklane_core::attachment::{Attachment, CreateAttachment};
use tasklane_core::task::{CreateTask, Task, TaskFields};
use tasklane_core::user::User;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the SQLite file lives. `None` means the XDG data directory.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    pub sqlite_path: Option<String>,
}

/// Relational persistence for tasks, attachments and users.
///
/// Lookups report absence with `None` (or `false` for writes that matched no
/// row) rather than an error; `DbError` is reserved for genuine failures.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Tasks --
    async fn list_tasks(&self) -> Result<Vec<Task>, DbError>;
    async fn get_task(&self, id: i64) -> Result<Option<Task>, DbError>;
    async fn create_task(&self, input: &CreateTask) -> Result<i64, DbError>;
    async fn update_task(&self, id: i64, fields: &TaskFields) -> Result<bool, DbError>;
    async fn delete_task(&self, id: i64) -> Result<bool, DbError>;

    // -- Attachments --
    async fn create_attachment(&self, input: &CreateAttachment) -> Result<i64, DbError>;
    async fn list_attachments(&self, task_id: i64) -> Result<Vec<Attachment>, DbError>;
    async fn get_attachment(&self, id: i64) -> Result<Option<Attachment>, DbError>;
    async fn delete_attachment(&self, id: i64) -> Result<bool, DbError>;

    // -- Users --
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, DbError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, DbError>;
}

/// Default data directory: `$XDG_DATA_HOME/tasklane`, falling back to
/// `~/.local/share/tasklane`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("tasklane")
}
