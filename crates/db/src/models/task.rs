//! Task entity model and DTOs.

use eventpulse_core::task::{TaskPriority, TaskState};
use eventpulse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A task joined with its zone name and assignee display name.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: DbId,
    pub event_id: DbId,
    pub zone_id: Option<String>,
    pub zone_name: Option<String>,
    pub title: String,
    pub description: String,
    pub state: TaskState,
    pub priority: TaskPriority,
    pub created_by: DbId,
    pub assignee_id: Option<DbId>,
    pub assignee_name: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// DTO for creating a task.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub event_id: DbId,
    pub zone_id: Option<String>,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub created_by: DbId,
    pub assignee_id: Option<DbId>,
}

/// Partial update of a task. At least one field must be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub state: Option<TaskState>,
    pub assignee_id: Option<DbId>,
    pub priority: Option<TaskPriority>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.assignee_id.is_none() && self.priority.is_none()
    }
}

/// Result of a task edit.
#[derive(Debug, Clone)]
pub enum TaskEditOutcome {
    Updated(Task),
    Forbidden(String),
    Invalid(String),
    NotFound,
}
