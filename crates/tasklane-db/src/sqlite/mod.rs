pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode};

use tasklane_core::attachment::{Attachment, CreateAttachment};
use tasklane_core::task::{CreateTask, Task, TaskFields};
use tasklane_core::user::User;

use crate::{Database, DbConfig, DbError};

/// `.to_db()?` maps driver errors inside the query modules.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("tasks.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    /// Open (or create) the database file and bring the schema up to date.
    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.pragma_update(None, "foreign_keys", true).to_db()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        migrations::run(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("sqlite connection mutex poisoned".into()))?;
        f(&conn)
    }
}

/// Map a `rusqlite::Error` into a `DbError`, keeping UNIQUE violations apart.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            DbError::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => DbError::Internal(e.to_string()),
    }
}

/// Run a blocking closure against a cloned handle on the blocking pool.
async fn blocking<F, T>(db: &SqliteDatabase, f: F) -> Result<T, DbError>
where
    F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?
}

#[async_trait]
impl Database for SqliteDatabase {
    // -- Tasks --
    async fn list_tasks(&self) -> Result<Vec<Task>, DbError> {
        blocking(self, |db| db.list_tasks_sync()).await
    }
    async fn get_task(&self, id: i64) -> Result<Option<Task>, DbError> {
        blocking(self, move |db| db.get_task_sync(id)).await
    }
    async fn create_task(&self, input: &CreateTask) -> Result<i64, DbError> {
        let input = input.clone();
        blocking(self, move |db| db.create_task_sync(&input)).await
    }
    async fn update_task(&self, id: i64, fields: &TaskFields) -> Result<bool, DbError> {
        let fields = fields.clone();
        blocking(self, move |db| db.update_task_sync(id, &fields)).await
    }
    async fn delete_task(&self, id: i64) -> Result<bool, DbError> {
        blocking(self, move |db| db.delete_task_sync(id)).await
    }

    // -- Attachments --
    async fn create_attachment(&self, input: &CreateAttachment) -> Result<i64, DbError> {
        let input = input.clone();
        blocking(self, move |db| db.create_attachment_sync(&input)).await
    }
    async fn list_attachments(&self, task_id: i64) -> Result<Vec<Attachment>, DbError> {
        blocking(self, move |db| db.list_attachments_sync(task_id)).await
    }
    async fn get_attachment(&self, id: i64) -> Result<Option<Attachment>, DbError> {
        blocking(self, move |db| db.get_attachment_sync(id)).await
    }
    async fn delete_attachment(&self, id: i64) -> Result<bool, DbError> {
        blocking(self, move |db| db.delete_attachment_sync(id)).await
    }

    // -- Users --
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, DbError> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();
        blocking(self, move |db| db.create_user_sync(&username, &password_hash)).await
    }
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let username = username.to_string();
        blocking(self, move |db| db.find_user_by_username_sync(&username)).await
    }
    async fn get_user(&self, id: i64) -> Result<Option<User>, DbError> {
        blocking(self, move |db| db.get_user_sync(id)).await
    }
}
