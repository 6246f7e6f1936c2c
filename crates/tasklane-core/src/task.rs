use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    #[serde(alias = "in_progress")]
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: &[TaskStatus] = &[
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in-progress" | "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update. Absent fields keep their stored value; `description: null`
/// clears the description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

/// The complete set of mutable columns written by a store update.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
}

fn check_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError("Title is required".into()));
    }
    Ok(())
}

impl CreateTask {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_title(&self.title)
    }
}

impl TaskFields {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_title(&self.title)
    }
}

impl Task {
    /// Resolve a partial update against this task.
    pub fn merged(&self, update: &UpdateTask) -> TaskFields {
        TaskFields {
            title: update.title.clone().unwrap_or_else(|| self.title.clone()),
            description: match &update.description {
                Some(description) => description.clone(),
                None => self.description.clone(),
            },
            status: update.status.unwrap_or(self.status),
        }
    }
}

/// Distinguishes a missing field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: 7,
            title: "Buy milk".into(),
            description: Some("two litres".into()),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        let parsed: TaskStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, TaskStatus::InProgress);
    }

    #[test]
    fn status_parse_str_matches_as_str() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse_str(status.as_str()), Some(*status));
        }
        assert_eq!(TaskStatus::parse_str("archived"), None);
    }

    #[test]
    fn update_distinguishes_null_from_missing() {
        let missing: UpdateTask = serde_json::from_str(r#"{"status":"completed"}"#).unwrap();
        assert_eq!(missing.description, None);

        let cleared: UpdateTask = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
    }

    #[test]
    fn merged_keeps_unsupplied_fields() {
        let task = sample_task();
        let fields = task.merged(&UpdateTask {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        });
        assert_eq!(fields.title, "Buy milk");
        assert_eq!(fields.description.as_deref(), Some("two litres"));
        assert_eq!(fields.status, TaskStatus::Completed);
    }

    #[test]
    fn blank_titles_fail_validation() {
        let input = CreateTask {
            title: "   ".into(),
            description: None,
        };
        assert_eq!(
            input.validate(),
            Err(ValidationError("Title is required".into()))
        );

        let fields = sample_task().merged(&UpdateTask {
            title: Some(String::new()),
            ..Default::default()
        });
        assert!(fields.validate().is_err());
    }

    #[test]
    fn merged_clears_description_on_explicit_null() {
        let task = sample_task();
        let fields = task.merged(&UpdateTask {
            description: Some(None),
            ..Default::default()
        });
        assert_eq!(fields.description, None);
        assert_eq!(fields.status, TaskStatus::Pending);
    }
}
