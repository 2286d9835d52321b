//! Chat message model.

use eventpulse_core::roles::Role;
use eventpulse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A chat message joined with its author's name and role.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: DbId,
    pub event_id: DbId,
    pub author_id: DbId,
    pub author_name: String,
    pub author_role: Role,
    pub content: String,
    pub sent_at: Timestamp,
}
