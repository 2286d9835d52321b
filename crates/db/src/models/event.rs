//! Event entity model and DTOs.

use eventpulse_core::event::EventState;
use eventpulse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `events` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: DbId,
    pub name: String,
    pub description: String,
    pub state: EventState,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub ended_at: Option<Timestamp>,
}

/// DTO for creating a new event.
#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub name: String,
    pub description: String,
    pub created_by: DbId,
}

/// Result of creating an event: the new event plus whichever event it
/// displaced as the active one.
#[derive(Debug, Clone)]
pub struct CreatedEvent {
    pub event: Event,
    pub ended: Option<Event>,
}

/// Result of ending an event.
#[derive(Debug, Clone)]
pub enum EndOutcome {
    Ended(Event),
    AlreadyEnded,
    NotFound,
}
