use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use tasklane_adapters::email::{reminder_message, test_message, Mailer};
use tasklane_cache::keys::{task_key, TASK_LIST_KEY, TASK_PREFIX};
use tasklane_cache::{Cache, CacheExt};
use tasklane_core::task::{CreateTask, Task, UpdateTask};
use tasklane_db::Database;
use tasklane_store::{task_attachments_prefix, ObjectStore};

use crate::ServiceError;

/// A read result, tagged with whether it was served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub available: bool,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailStatus {
    pub configured: bool,
    pub connected: bool,
}

/// Cache-aside task operations.
///
/// Reads try the cache first and fill it on a miss. Writes go to the database
/// and then drop the affected keys. The cache may be down at any point; that
/// only changes `from_cache`, never the outcome.
pub struct TaskService {
    pub(crate) db: Arc<dyn Database>,
    pub(crate) cache: Arc<dyn Cache>,
    pub(crate) store: Arc<dyn ObjectStore>,
    mailer: Option<Arc<dyn Mailer>>,
    ttl: Duration,
}

impl TaskService {
    pub fn new(
        db: Arc<dyn Database>,
        cache: Arc<dyn Cache>,
        store: Arc<dyn ObjectStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            db,
            cache,
            store,
            mailer: None,
            ttl,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub async fn get_task(&self, id: i64) -> Result<Cached<Task>, ServiceError> {
        let key = task_key(id);
        if let Some(task) = self.cache.get_json::<Task>(&key).await {
            return Ok(Cached {
                value: task,
                from_cache: true,
            });
        }

        let task = self
            .db
            .get_task(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Task not found".into()))?;
        self.cache.set_json(&key, &task, self.ttl).await;
        Ok(Cached {
            value: task,
            from_cache: false,
        })
    }

    pub async fn list_tasks(&self) -> Result<Cached<Vec<Task>>, ServiceError> {
        if let Some(tasks) = self.cache.get_json::<Vec<Task>>(TASK_LIST_KEY).await {
            return Ok(Cached {
                value: tasks,
                from_cache: true,
            });
        }

        let tasks = self.db.list_tasks().await?;
        self.cache.set_json(TASK_LIST_KEY, &tasks, self.ttl).await;
        Ok(Cached {
            value: tasks,
            from_cache: false,
        })
    }

    pub async fn create_task(&self, input: &CreateTask) -> Result<Task, ServiceError> {
        input.validate()?;
        let id = self.db.create_task(input).await?;
        self.invalidate(&[TASK_LIST_KEY, &task_key(id)]).await;

        let task = self
            .db
            .get_task(id)
            .await?
            .ok_or_else(|| ServiceError::Internal(format!("task {id} missing after insert")))?;
        info!(task_id = id, "task created");
        Ok(task)
    }

    pub async fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, ServiceError> {
        let current = self
            .db
            .get_task(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Task not found".into()))?;

        let fields = current.merged(update);
        fields.validate()?;
        if !self.db.update_task(id, &fields).await? {
            return Err(ServiceError::NotFound("Task not found".into()));
        }
        self.invalidate(&[&task_key(id), TASK_LIST_KEY]).await;

        self.db
            .get_task(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Task not found".into()))
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), ServiceError> {
        let prefix = task_attachments_prefix(id);
        let files = self.store.list(&prefix).await.unwrap_or_else(|e| {
            warn!(task_id = id, error = %e, "could not list attachment files");
            Vec::new()
        });

        if !self.db.delete_task(id).await? {
            return Err(ServiceError::NotFound("Task not found".into()));
        }
        self.invalidate(&[&task_key(id), TASK_LIST_KEY]).await;

        for key in files {
            if let Err(e) = self.store.delete(&key).await {
                warn!(task_id = id, %key, error = %e, "failed to remove attachment file");
            }
        }
        info!(task_id = id, "task deleted");
        Ok(())
    }

    /// Drop every task entry from the cache.
    pub async fn clear_cache(&self) -> bool {
        let cleared = self.cache.delete_by_prefix(TASK_PREFIX).await;
        if cleared {
            info!("task cache cleared");
        } else {
            warn!("task cache clear failed");
        }
        cleared
    }

    pub fn cache_status(&self) -> CacheStatus {
        let stats = self.cache.stats();
        CacheStatus {
            available: self.cache.is_available(),
            ttl_seconds: self.ttl.as_secs(),
            hits: stats.hits(),
            misses: stats.misses(),
        }
    }

    // -- Email --

    fn mailer(&self) -> Result<&Arc<dyn Mailer>, ServiceError> {
        self.mailer
            .as_ref()
            .ok_or_else(|| ServiceError::Unavailable("Email service is not configured".into()))
    }

    pub async fn send_task_reminder(&self, task_id: i64, to: &str) -> Result<(), ServiceError> {
        check_recipient(to)?;
        let mailer = self.mailer()?;
        let task = self.get_task(task_id).await?.value;
        let message = reminder_message(mailer.sender(), to.trim(), &task);
        mailer.send(&message).await?;
        info!(task_id, "reminder sent");
        Ok(())
    }

    pub async fn send_test_email(&self, to: &str) -> Result<(), ServiceError> {
        check_recipient(to)?;
        let mailer = self.mailer()?;
        mailer.send(&test_message(mailer.sender(), to.trim())).await?;
        Ok(())
    }

    pub async fn email_status(&self) -> EmailStatus {
        match &self.mailer {
            Some(mailer) => EmailStatus {
                configured: true,
                connected: mailer.verify_connection().await,
            },
            None => EmailStatus {
                configured: false,
                connected: false,
            },
        }
    }

    /// Best-effort removal of cache keys, in the given order.
    async fn invalidate(&self, keys: &[&str]) {
        for key in keys {
            if !self.cache.delete(key).await && self.cache.is_available() {
                warn!(%key, "cache invalidation failed");
            }
        }
    }
}

fn check_recipient(to: &str) -> Result<(), ServiceError> {
    let to = to.trim();
    if to.is_empty() || !to.contains('@') || to.contains(['\r', '\n', '<', '>']) {
        return Err(ServiceError::InvalidInput(
            "A valid recipient email address is required".into(),
        ));
    }
    Ok(())
}
