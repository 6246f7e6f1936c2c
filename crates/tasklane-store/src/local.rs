use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::{ObjectStore, StoreConfig, StoreError};

/// Files on the local filesystem under a single upload root.
pub struct LocalStore {
    root: PathBuf,
}

fn io_error(op: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { op, path, source }
}

impl LocalStore {
    pub fn new(config: &StoreConfig) -> Self {
        let root = match &config.upload_dir {
            Some(dir) => PathBuf::from(dir),
            None => default_upload_dir(),
        };
        debug!(root = %root.display(), "local upload store");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Only plain relative components are allowed, so a key can never name a
    /// file outside the root.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return Err(StoreError::InvalidKey(key.to_string())),
            }
        }
        Ok(path)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

fn default_upload_dir() -> PathBuf {
    let data_home = std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| Path::new(&home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    data_home.join("tasklane/uploads")
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(io_error("create directory", dir))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(io_error("write", &path))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
                _ => io_error("read", &path)(e),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error("remove", &path)(e)),
            _ => Ok(()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut pending = vec![self.path_for(prefix)?];
        let mut keys = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error("list", &dir)(e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(io_error("list", &dir))?
            {
                let path = entry.path();
                let is_dir = entry
                    .file_type()
                    .await
                    .map_err(io_error("stat", &path))?
                    .is_dir();
                if is_dir {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(io_error("stat", &path))
    }
}
