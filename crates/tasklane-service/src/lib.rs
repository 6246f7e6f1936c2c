mod attachments;
pub mod auth;
mod error;
mod tasks;

pub use attachments::{ALLOWED_EXTENSIONS, MAX_ATTACHMENT_BYTES};
pub use auth::{AuthConfig, AuthService, AuthSession};
pub use error::ServiceError;
pub use tasks::{CacheStatus, Cached, EmailStatus, TaskService};
