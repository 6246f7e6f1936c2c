use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use tasklane_core::attachment::{Attachment, CreateAttachment};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_attachment(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        filename: row.get("filename")?,
        original_name: row.get("original_name")?,
        file_path: row.get("file_path")?,
        file_size: row.get("file_size")?,
        mime_type: row.get("mime_type")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_attachment_sync(&self, input: &CreateAttachment) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO attachments
                     (task_id, filename, original_name, file_path, file_size, mime_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    input.task_id,
                    input.filename,
                    input.original_name,
                    input.file_path,
                    input.file_size,
                    input.mime_type,
                    Utc::now(),
                ],
            )
            .to_db()?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_attachments_sync(&self, task_id: i64) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM attachments WHERE task_id = ?1
                     ORDER BY created_at DESC, id DESC",
                )
                .to_db()?;
            let rows = stmt
                .query_map(params![task_id], row_to_attachment)
                .to_db()?;
            rows.collect::<Result<Vec<_>, _>>().to_db()
        })
    }

    pub fn get_attachment_sync(&self, id: i64) -> Result<Option<Attachment>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                row_to_attachment,
            )
            .optional()
            .to_db()
        })
    }

    pub fn delete_attachment_sync(&self, id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM attachments WHERE id = ?1", params![id])
                .to_db()?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklane_core::task::CreateTask;

    fn attachment_for(task_id: i64, name: &str) -> CreateAttachment {
        CreateAttachment {
            task_id,
            filename: format!("0000-{name}"),
            original_name: name.into(),
            file_path: format!("attachments/{task_id}/0000-{name}"),
            file_size: 12,
            mime_type: Some("text/plain".into()),
        }
    }

    fn seed_task(db: &SqliteDatabase) -> i64 {
        db.create_task_sync(&CreateTask {
            title: "with files".into(),
            description: None,
        })
        .unwrap()
    }

    #[test]
    fn create_list_get_delete() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let task_id = seed_task(&db);

        let first = db
            .create_attachment_sync(&attachment_for(task_id, "a.txt"))
            .unwrap();
        let second = db
            .create_attachment_sync(&attachment_for(task_id, "b.txt"))
            .unwrap();

        let listed: Vec<i64> = db
            .list_attachments_sync(task_id)
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(listed, vec![second, first]);

        let got = db.get_attachment_sync(first).unwrap().unwrap();
        assert_eq!(got.original_name, "a.txt");
        assert_eq!(got.file_size, 12);

        assert!(db.delete_attachment_sync(first).unwrap());
        assert!(!db.delete_attachment_sync(first).unwrap());
        assert!(db.get_attachment_sync(first).unwrap().is_none());
    }

    #[test]
    fn unknown_task_is_rejected_by_foreign_key() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let result = db.create_attachment_sync(&attachment_for(999, "orphan.txt"));
        assert!(matches!(result, Err(DbError::Internal(_))));
    }

    #[test]
    fn deleting_task_cascades_to_attachments() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let task_id = seed_task(&db);
        let id = db
            .create_attachment_sync(&attachment_for(task_id, "a.txt"))
            .unwrap();

        db.delete_task_sync(task_id).unwrap();
        assert!(db.get_attachment_sync(id).unwrap().is_none());
        assert!(db.list_attachments_sync(task_id).unwrap().is_empty());
    }
}
