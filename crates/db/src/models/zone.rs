//! Zone entity model and DTOs.

use eventpulse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A zone row. `id` is the admin-chosen slug, unique within `event_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub event_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}

/// DTO for creating a zone inside an event.
#[derive(Debug, Clone)]
pub struct CreateZone {
    pub event_id: DbId,
    pub slug: String,
    pub name: String,
}
