pub mod attachment;
pub mod error;
pub mod task;
pub mod user;

pub use attachment::{Attachment, CreateAttachment};
pub use error::ValidationError;
pub use task::{CreateTask, Task, TaskFields, TaskStatus, UpdateTask};
pub use user::{Claims, User};
