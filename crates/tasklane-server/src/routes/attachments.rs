use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use bytes::Bytes;
use serde_json::Value;

use super::{ok, ok_message, parse_id, ApiError, ApiResult, AppState};

const TASK_NOT_FOUND: &str = "Task not found";
const ATTACHMENT_NOT_FOUND: &str = "Attachment not found";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tasks/{id}/attachments",
            get(list_attachments).post(upload_attachment),
        )
        .route("/api/attachments/{id}/download", get(download_attachment))
        .route("/api/attachments/{id}", delete(delete_attachment))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "File too large (max 5 MB)")
    } else {
        ApiError::new(e.status(), e.body_text())
    }
}

struct Upload {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

/// Pull the `file` part out of the form, skipping any other fields.
async fn read_file_field(multipart: &mut Multipart) -> ApiResult<Option<Upload>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(Upload {
            file_name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

async fn upload_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let task_id = parse_id(&id, TASK_NOT_FOUND)?;
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    // A missing part is reported by the service after the task lookup, so an
    // unknown task wins over an empty form.
    let upload = read_file_field(&mut multipart).await?;
    let (file_name, content_type, data) = match upload {
        Some(u) => (u.file_name, u.content_type, u.data),
        None => (String::new(), None, Bytes::new()),
    };

    let attachment = state
        .tasks
        .add_attachment(task_id, &file_name, content_type.as_deref(), data)
        .await?;
    Ok((StatusCode::CREATED, ok(attachment)))
}

async fn list_attachments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task_id = parse_id(&id, TASK_NOT_FOUND)?;
    Ok(ok(state.tasks.list_attachments(task_id).await?))
}

/// `Content-Disposition` with an ASCII fallback name and the exact UTF-8 name.
fn content_disposition(original_name: &str) -> String {
    let fallback: String = original_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut encoded = String::with_capacity(original_name.len());
    for b in original_name.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{b:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

async fn download_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_id(&id, ATTACHMENT_NOT_FOUND)?;
    let (attachment, data) = state.tasks.download_attachment(id).await?;
    let content_type = attachment
        .mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&attachment.original_name),
            ),
        ],
        Body::from(data),
    )
        .into_response())
}

async fn delete_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, ATTACHMENT_NOT_FOUND)?;
    state.tasks.delete_attachment(id).await?;
    Ok(ok_message("Attachment deleted successfully"))
}
