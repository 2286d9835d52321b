//! Task lifecycle.
//!
//! Tasks are proactive work items. Unlike incidents they may move back and
//! forth between `pending` and `in_progress`, but `completed` is terminal.
//! `completed_at` is set exactly when the state is `completed`.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "task_state", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

/// Check a task state change. Staying in the same state is a no-op.
pub fn check_task_transition(from: TaskState, to: TaskState) -> Result<(), String> {
    if from == TaskState::Completed && to != TaskState::Completed {
        return Err("completed tasks cannot be reopened".to_string());
    }
    Ok(())
}

/// `completed_at` is non-null exactly when the task is completed.
pub fn completion_consistent(state: TaskState, completed_at: Option<Timestamp>) -> bool {
    (state == TaskState::Completed) == completed_at.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_is_terminal() {
        assert!(check_task_transition(TaskState::Completed, TaskState::Pending).is_err());
        assert!(check_task_transition(TaskState::Completed, TaskState::InProgress).is_err());
        assert!(check_task_transition(TaskState::Completed, TaskState::Completed).is_ok());
    }

    #[test]
    fn open_states_move_freely() {
        assert!(check_task_transition(TaskState::Pending, TaskState::InProgress).is_ok());
        assert!(check_task_transition(TaskState::InProgress, TaskState::Pending).is_ok());
        assert!(check_task_transition(TaskState::Pending, TaskState::Completed).is_ok());
    }

    #[test]
    fn completion_timestamp_tracks_state() {
        let now = chrono::Utc::now();
        assert!(completion_consistent(TaskState::Completed, Some(now)));
        assert!(completion_consistent(TaskState::Pending, None));
        assert!(!completion_consistent(TaskState::Completed, None));
        assert!(!completion_consistent(TaskState::InProgress, Some(now)));
    }
}
