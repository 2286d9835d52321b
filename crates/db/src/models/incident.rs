//! Incident entity model, history rows, and claim/resolve/edit outcomes.

use eventpulse_core::incident::{ClaimConflict, IncidentState, IncidentType};
use eventpulse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An incident joined with its zone name and assignee display name.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Incident {
    pub id: DbId,
    pub event_id: DbId,
    pub zone_id: String,
    pub zone_name: String,
    #[serde(rename = "type")]
    pub kind: IncidentType,
    pub description: String,
    pub state: IncidentState,
    pub created_by: DbId,
    pub assignee_id: Option<DbId>,
    pub assignee_name: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for filing a new incident.
#[derive(Debug, Clone)]
pub struct CreateIncident {
    pub event_id: DbId,
    pub zone_id: String,
    pub kind: IncidentType,
    pub description: String,
    pub created_by: DbId,
    pub assignee_id: Option<DbId>,
}

/// Admin edit of an incident. At least one field must be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentPatch {
    pub state: Option<IncidentState>,
    pub assignee_id: Option<DbId>,
}

impl IncidentPatch {
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.assignee_id.is_none()
    }
}

/// One append-only row of `incident_history`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IncidentHistoryEntry {
    pub id: DbId,
    pub incident_id: DbId,
    pub from_state: IncidentState,
    pub to_state: IncidentState,
    pub actor_id: DbId,
    pub actor_name: String,
    pub created_at: Timestamp,
}

/// Result of a claim attempt.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed(Incident),
    Conflict(ClaimConflict),
    NotFound,
}

/// Result of a resolve attempt.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Resolved(Incident),
    /// Neither the assignee nor an elevated role, or a non-admin skipping the claim.
    NotAllowed,
    AlreadyResolved,
    NotFound,
}

/// Result of an admin edit.
#[derive(Debug, Clone)]
pub enum EditOutcome {
    Updated(Incident),
    Invalid(String),
    NotFound,
}
