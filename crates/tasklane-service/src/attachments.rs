use std::path::Path;

use bytes::Bytes;
use tracing::{info, warn};

use tasklane_core::attachment::{Attachment, CreateAttachment};
use tasklane_store::attachment_key;

use crate::{ServiceError, TaskService};

pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpeg", "jpg", "png", "gif", "pdf", "doc", "docx", "txt", "zip",
];

/// MIME types accepted for each allowed extension. The first entry is used
/// when the client did not send one.
fn mime_types_for(ext: &str) -> &'static [&'static str] {
    match ext {
        "jpeg" | "jpg" => &["image/jpeg", "image/jpg", "image/pjpeg"],
        "png" => &["image/png"],
        "gif" => &["image/gif"],
        "pdf" => &["application/pdf"],
        "doc" => &["application/msword"],
        "docx" => &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
        "txt" => &["text/plain"],
        "zip" => &["application/zip", "application/x-zip-compressed"],
        _ => &[],
    }
}

/// Check the name and declared type against the allow-list and return the
/// MIME type to record.
fn check_file_type(original_name: &str, mime_type: Option<&str>) -> Result<String, ServiceError> {
    let invalid = || {
        ServiceError::InvalidInput(
            "Invalid file type. Allowed types: images, PDF, documents, text, zip".into(),
        )
    };
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(invalid)?;
    let accepted = mime_types_for(&ext);
    let default = accepted.first().ok_or_else(invalid)?;

    match mime_type.map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase()) {
        None => Ok(default.to_string()),
        Some(m) if m.is_empty() => Ok(default.to_string()),
        Some(m) if accepted.contains(&m.as_str()) => Ok(m),
        Some(_) => Err(invalid()),
    }
}

/// Reduce a client-supplied name to a safe final path component.
fn sanitize_filename(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return "file".to_string();
    }
    // Keep the tail so the extension survives truncation.
    let skip = cleaned.chars().count().saturating_sub(100);
    cleaned.chars().skip(skip).collect()
}

impl TaskService {
    async fn require_task(&self, task_id: i64) -> Result<(), ServiceError> {
        match self.db.get_task(task_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound("Task not found".into())),
        }
    }

    pub async fn add_attachment(
        &self,
        task_id: i64,
        original_name: &str,
        mime_type: Option<&str>,
        data: Bytes,
    ) -> Result<Attachment, ServiceError> {
        self.require_task(task_id).await?;

        if original_name.trim().is_empty() {
            return Err(ServiceError::InvalidInput("No file uploaded".into()));
        }
        if data.len() > MAX_ATTACHMENT_BYTES {
            return Err(ServiceError::InvalidInput("File too large (max 5 MB)".into()));
        }
        let mime_type = check_file_type(original_name, mime_type)?;

        let filename = format!("{}-{}", uuid::Uuid::new_v4().simple(), sanitize_filename(original_name));
        let key = attachment_key(task_id, &filename);
        let file_size = data.len() as i64;
        self.store.put(&key, data).await?;

        let input = CreateAttachment {
            task_id,
            filename,
            original_name: original_name.to_string(),
            file_path: key.clone(),
            file_size,
            mime_type: Some(mime_type),
        };
        let id = match self.db.create_attachment(&input).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&key).await {
                    warn!(%key, error = %cleanup, "failed to remove orphaned upload");
                }
                return Err(e.into());
            }
        };

        info!(task_id, attachment_id = id, size = file_size, "attachment stored");
        self.db
            .get_attachment(id)
            .await?
            .ok_or_else(|| ServiceError::Internal(format!("attachment {id} missing after insert")))
    }

    pub async fn list_attachments(&self, task_id: i64) -> Result<Vec<Attachment>, ServiceError> {
        self.require_task(task_id).await?;
        Ok(self.db.list_attachments(task_id).await?)
    }

    async fn require_attachment(&self, id: i64) -> Result<Attachment, ServiceError> {
        self.db
            .get_attachment(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Attachment not found".into()))
    }

    pub async fn download_attachment(&self, id: i64) -> Result<(Attachment, Bytes), ServiceError> {
        let attachment = self.require_attachment(id).await?;
        let data = self
            .store
            .get_opt(&attachment.file_path)
            .await?
            .ok_or_else(|| ServiceError::NotFound("File not found".into()))?;
        Ok((attachment, data))
    }

    pub async fn delete_attachment(&self, id: i64) -> Result<(), ServiceError> {
        let attachment = self.require_attachment(id).await?;
        if let Err(e) = self.store.delete(&attachment.file_path).await {
            warn!(attachment_id = id, error = %e, "failed to remove attachment file");
        }
        if !self.db.delete_attachment(id).await? {
            return Err(ServiceError::NotFound("Attachment not found".into()));
        }
        Ok(())
    }
}
