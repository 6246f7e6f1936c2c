use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use tasklane_core::task::{CreateTask, Task, TaskFields, TaskStatus};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get("status")?;
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: TaskStatus::parse_str(&status_str).unwrap_or_default(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl SqliteDatabase {
    pub fn list_tasks_sync(&self) -> Result<Vec<Task>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM tasks ORDER BY created_at DESC, id DESC")
                .to_db()?;
            let rows = stmt.query_map([], row_to_task).to_db()?;
            rows.collect::<Result<Vec<_>, _>>().to_db()
        })
    }

    pub fn get_task_sync(&self, id: i64) -> Result<Option<Task>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM tasks WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .optional()
            .to_db()
        })
    }

    pub fn create_task_sync(&self, input: &CreateTask) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO tasks (title, description, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    input.title,
                    input.description,
                    TaskStatus::Pending.as_str(),
                    now,
                    now,
                ],
            )
            .to_db()?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Overwrite every mutable column. Returns `false` when no row matched.
    pub fn update_task_sync(&self, id: i64, fields: &TaskFields) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE tasks SET title = ?1, description = ?2, status = ?3, updated_at = ?4
                     WHERE id = ?5",
                    params![
                        fields.title,
                        fields.description,
                        fields.status.as_str(),
                        Utc::now(),
                        id,
                    ],
                )
                .to_db()?;
            Ok(changed > 0)
        })
    }

    pub fn delete_task_sync(&self, id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![id])
                .to_db()?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(title: &str) -> CreateTask {
        CreateTask {
            title: title.into(),
            description: None,
        }
    }

    #[test]
    fn create_then_get_defaults_to_pending() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let id = db
            .create_task_sync(&CreateTask {
                title: "Write report".into(),
                description: Some("Q3 numbers".into()),
            })
            .unwrap();

        let task = db.get_task_sync(id).unwrap().unwrap();
        assert_eq!(task.title, "Write report");
        assert_eq!(task.description.as_deref(), Some("Q3 numbers"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn get_missing_task_is_none() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        assert!(db.get_task_sync(42).unwrap().is_none());
    }

    #[test]
    fn list_is_newest_first() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let a = db.create_task_sync(&new_task("a")).unwrap();
        let b = db.create_task_sync(&new_task("b")).unwrap();
        let c = db.create_task_sync(&new_task("c")).unwrap();

        let ids: Vec<i64> = db.list_tasks_sync().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![c, b, a]);
    }

    #[test]
    fn update_overwrites_fields_and_bumps_updated_at() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let id = db.create_task_sync(&new_task("draft")).unwrap();
        let before = db.get_task_sync(id).unwrap().unwrap();

        let updated = db
            .update_task_sync(
                id,
                &TaskFields {
                    title: "final".into(),
                    description: Some("done".into()),
                    status: TaskStatus::Completed,
                },
            )
            .unwrap();
        assert!(updated);

        let after = db.get_task_sync(id).unwrap().unwrap();
        assert_eq!(after.title, "final");
        assert_eq!(after.status, TaskStatus::Completed);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let fields = TaskFields {
            title: "x".into(),
            description: None,
            status: TaskStatus::Pending,
        };
        assert!(!db.update_task_sync(7, &fields).unwrap());
        assert!(!db.delete_task_sync(7).unwrap());

        let id = db.create_task_sync(&new_task("gone")).unwrap();
        assert!(db.delete_task_sync(id).unwrap());
        assert!(db.get_task_sync(id).unwrap().is_none());
    }
}
