//! Blob storage for uploaded attachment files.
//!
//! Files are addressed by relative keys such as `attachments/7/<name>`, so a
//! task's files can be found and swept by prefix.

mod local;

pub use local::LocalStore;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no such file: {0}")]
    NotFound(String),

    #[error("key is not a relative path inside the upload root: {0}")]
    InvalidKey(String),

    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous contents.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Fails with `NotFound` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    async fn get_opt(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.get(key).await.map(Some).or_else(|e| match e {
            StoreError::NotFound(_) => Ok(None),
            other => Err(other),
        })
    }

    /// Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Every key below `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get_opt(key).await?.is_some())
    }
}

/// Directory holding every file attached to `task_id`.
pub fn task_attachments_prefix(task_id: i64) -> String {
    format!("attachments/{task_id}")
}

pub fn attachment_key(task_id: i64, filename: &str) -> String {
    format!("{}/{filename}", task_attachments_prefix(task_id))
}

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Root for uploaded files. `None` means `<data dir>/uploads`.
    pub upload_dir: Option<String>,
}

pub fn create_store(config: &StoreConfig) -> Arc<dyn ObjectStore> {
    Arc::new(LocalStore::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_keys_nest_under_task_prefix() {
        assert_eq!(attachment_key(12, "abc-notes.txt"), "attachments/12/abc-notes.txt");
        assert_eq!(task_attachments_prefix(12), "attachments/12");
        assert!(attachment_key(12, "x").starts_with(&task_attachments_prefix(12)));
    }

    #[tokio::test]
    async fn configured_upload_dir_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        let store = create_store(&StoreConfig {
            upload_dir: Some(tmp.path().to_string_lossy().to_string()),
        });
        store
            .put(&attachment_key(1, "a.txt"), Bytes::from("hi"))
            .await
            .unwrap();
        assert!(tmp.path().join("attachments/1/a.txt").exists());
        assert!(store.exists("attachments/1/a.txt").await.unwrap());
    }
}
