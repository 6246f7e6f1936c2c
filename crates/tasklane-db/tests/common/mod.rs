// Contract tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so the assertions stay
// independent of the backend that runs them.

use tasklane_core::attachment::CreateAttachment;
use tasklane_core::task::{CreateTask, TaskFields, TaskStatus};
use tasklane_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_task(title: &str) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: None,
    }
}

fn make_attachment(task_id: i64, name: &str) -> CreateAttachment {
    CreateAttachment {
        task_id,
        filename: format!("abc-{name}"),
        original_name: name.to_string(),
        file_path: format!("attachments/{task_id}/abc-{name}"),
        file_size: 3,
        mime_type: None,
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Create, read, update and delete a single task.
pub async fn test_task_crud(db: &dyn Database) {
    let id = db
        .create_task(&CreateTask {
            title: "Buy milk".into(),
            description: Some("2 litres".into()),
        })
        .await
        .unwrap();

    let task = db.get_task(id).await.unwrap().unwrap();
    assert_eq!(task.title, "Buy milk");
    assert_eq!(task.status, TaskStatus::Pending);

    let changed = db
        .update_task(
            id,
            &TaskFields {
                title: "Buy oat milk".into(),
                description: None,
                status: TaskStatus::InProgress,
            },
        )
        .await
        .unwrap();
    assert!(changed);

    let task = db.get_task(id).await.unwrap().unwrap();
    assert_eq!(task.title, "Buy oat milk");
    assert_eq!(task.description, None);
    assert_eq!(task.status, TaskStatus::InProgress);

    assert!(db.delete_task(id).await.unwrap());
    assert!(db.get_task(id).await.unwrap().is_none());
    assert!(!db.delete_task(id).await.unwrap());
}

/// Listing returns newest first.
pub async fn test_task_ordering(db: &dyn Database) {
    let first = db.create_task(&make_task("first")).await.unwrap();
    let second = db.create_task(&make_task("second")).await.unwrap();

    let tasks = db.list_tasks().await.unwrap();
    let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second, first]);
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

/// Attachment rows follow their task's lifecycle.
pub async fn test_attachment_lifecycle(db: &dyn Database) {
    let task_id = db.create_task(&make_task("files")).await.unwrap();
    let other_id = db.create_task(&make_task("other")).await.unwrap();

    let a = db
        .create_attachment(&make_attachment(task_id, "a.txt"))
        .await
        .unwrap();
    db.create_attachment(&make_attachment(other_id, "b.txt"))
        .await
        .unwrap();

    let listed = db.list_attachments(task_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, a);
    assert_eq!(listed[0].file_path, format!("attachments/{task_id}/abc-a.txt"));

    db.delete_task(task_id).await.unwrap();
    assert!(db.get_attachment(a).await.unwrap().is_none());
    assert_eq!(db.list_attachments(other_id).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Usernames are unique; lookups return `None` for unknown users.
pub async fn test_users(db: &dyn Database) {
    let user = db.create_user("carol", "pbkdf2-sha256$1$x$y").await.unwrap();
    assert_eq!(user.username, "carol");

    let found = db.find_user_by_username("carol").await.unwrap().unwrap();
    assert_eq!(found.id, user.id);
    assert_eq!(db.get_user(user.id).await.unwrap().unwrap().username, "carol");

    let dup = db.create_user("carol", "other").await;
    assert!(matches!(dup, Err(DbError::Conflict(_))));

    assert!(db.find_user_by_username("dave").await.unwrap().is_none());
}
