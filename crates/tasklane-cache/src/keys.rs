//! Cache key layout for task entries.

/// Prefix shared by every task-related key.
pub const TASK_PREFIX: &str = "task:";

/// Key holding the serialized full task list.
pub const TASK_LIST_KEY: &str = "task:all";

pub fn task_key(id: i64) -> String {
    format!("{TASK_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_task_keys_share_the_prefix() {
        assert_eq!(task_key(7), "task:7");
        assert!(task_key(7).starts_with(TASK_PREFIX));
        assert!(TASK_LIST_KEY.starts_with(TASK_PREFIX));
    }
}
