//! Event lifecycle.

use serde::{Deserialize, Serialize};

/// At most one event is `Active` at a time; `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "event_state", rename_all = "snake_case")]
pub enum EventState {
    Active,
    Ended,
}
