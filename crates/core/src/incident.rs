//! Incident lifecycle and the claim state machine.
//!
//! ```text
//! pending ──claim──▶ in_attention ──resolve──▶ resolved
//!    └──────────── admin resolve ────────────────▲
//! ```
//!
//! `resolved` is terminal; there is no reopen. Every transition is recorded
//! as an append-only history row, and any recorded history must be a
//! walk through this graph starting at `pending`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "incident_type", rename_all = "snake_case")]
pub enum IncidentType {
    Spill,
    Security,
    Restock,
    Medical,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "incident_state", rename_all = "snake_case")]
pub enum IncidentState {
    Pending,
    InAttention,
    Resolved,
}

impl IncidentState {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentState::Pending => "pending",
            IncidentState::InAttention => "in_attention",
            IncidentState::Resolved => "resolved",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == IncidentState::Resolved
    }
}

impl fmt::Display for IncidentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("illegal incident transition {from} -> {to}")]
    Illegal {
        from: IncidentState,
        to: IncidentState,
    },

    #[error("transition {from} -> {to} requires the admin role")]
    AdminOnly {
        from: IncidentState,
        to: IncidentState,
    },
}

/// Whether `from -> to` is an edge of the state machine at all.
pub fn is_legal_transition(from: IncidentState, to: IncidentState) -> bool {
    use IncidentState::*;
    matches!(
        (from, to),
        (Pending, InAttention) | (InAttention, Resolved) | (Pending, Resolved)
    )
}

/// Check a transition requested by an actor with `role`.
///
/// `pending -> resolved` skips the claim and is reserved for admins.
pub fn check_transition(
    from: IncidentState,
    to: IncidentState,
    role: Role,
) -> Result<(), TransitionError> {
    if !is_legal_transition(from, to) {
        return Err(TransitionError::Illegal { from, to });
    }
    if from == IncidentState::Pending && to == IncidentState::Resolved && !role.is_admin() {
        return Err(TransitionError::AdminOnly { from, to });
    }
    Ok(())
}

/// Reason a recorded history cannot be replayed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("history must start from pending, row 0 starts from {0}")]
    BadStart(IncidentState),

    #[error("row {index} starts from {found} but the previous row ended in {expected}")]
    Discontinuous {
        index: usize,
        expected: IncidentState,
        found: IncidentState,
    },

    #[error("row {index} records an illegal transition")]
    Illegal {
        index: usize,
        #[source]
        source: TransitionError,
    },
}

/// Verify a sequence of `(prior, new)` pairs is a valid walk from `pending`.
///
/// An empty history is valid (the incident is still pending).
pub fn validate_history_path(
    steps: &[(IncidentState, IncidentState)],
) -> Result<(), HistoryError> {
    let mut current = IncidentState::Pending;
    for (index, &(from, to)) in steps.iter().enumerate() {
        if from != current {
            return Err(if index == 0 {
                HistoryError::BadStart(from)
            } else {
                HistoryError::Discontinuous {
                    index,
                    expected: current,
                    found: from,
                }
            });
        }
        if !is_legal_transition(from, to) {
            return Err(HistoryError::Illegal {
                index,
                source: TransitionError::Illegal { from, to },
            });
        }
        current = to;
    }
    Ok(())
}

/// Fallback winner name while the winning transaction is still in flight.
const UNKNOWN_WINNER: &str = "otro usuario";

/// Why a claim lost. Expected under contention; not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimConflict {
    /// The row was locked by another claim that has not committed yet.
    InFlight { winner_name: Option<String> },
    /// Somebody already committed a claim.
    AlreadyClaimed { winner_name: Option<String> },
    /// The incident left `pending` some other way (e.g. admin resolve).
    NotPending { state: IncidentState },
}

impl ClaimConflict {
    /// Display name of whoever holds the incident, if known.
    pub fn winner_name(&self) -> Option<&str> {
        match self {
            ClaimConflict::InFlight { winner_name } | ClaimConflict::AlreadyClaimed { winner_name } => {
                winner_name.as_deref()
            }
            ClaimConflict::NotPending { .. } => None,
        }
    }

    /// Human-readable reason shown to the losing worker.
    pub fn message(&self) -> String {
        match self {
            ClaimConflict::InFlight { winner_name } | ClaimConflict::AlreadyClaimed { winner_name } => {
                format!(
                    "Conflicto: ya fue tomada por {}",
                    winner_name.as_deref().unwrap_or(UNKNOWN_WINNER)
                )
            }
            ClaimConflict::NotPending { state } => {
                format!("Conflicto: ya está en estado {state}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use IncidentState::*;

    #[test]
    fn legal_edges() {
        assert!(is_legal_transition(Pending, InAttention));
        assert!(is_legal_transition(InAttention, Resolved));
        assert!(is_legal_transition(Pending, Resolved));
    }

    #[test]
    fn no_reopen_and_no_self_loops() {
        assert!(!is_legal_transition(Resolved, InAttention));
        assert!(!is_legal_transition(Resolved, Pending));
        assert!(!is_legal_transition(InAttention, Pending));
        assert!(!is_legal_transition(Pending, Pending));
        assert!(!is_legal_transition(Resolved, Resolved));
    }

    #[test]
    fn pending_to_resolved_is_admin_only() {
        assert!(check_transition(Pending, Resolved, Role::Admin).is_ok());
        assert_matches!(
            check_transition(Pending, Resolved, Role::Supervisor),
            Err(TransitionError::AdminOnly { .. })
        );
        assert!(check_transition(InAttention, Resolved, Role::Cleaning).is_ok());
    }

    #[test]
    fn replays_valid_histories() {
        assert!(validate_history_path(&[]).is_ok());
        assert!(validate_history_path(&[(Pending, InAttention), (InAttention, Resolved)]).is_ok());
        assert!(validate_history_path(&[(Pending, Resolved)]).is_ok());
    }

    #[test]
    fn rejects_reopen_in_history() {
        let steps = [
            (Pending, InAttention),
            (InAttention, Resolved),
            (Resolved, InAttention),
        ];
        assert_matches!(
            validate_history_path(&steps),
            Err(HistoryError::Illegal { index: 2, .. })
        );
    }

    #[test]
    fn rejects_gaps_and_bad_start() {
        assert_matches!(
            validate_history_path(&[(InAttention, Resolved)]),
            Err(HistoryError::BadStart(InAttention))
        );
        assert_matches!(
            validate_history_path(&[(Pending, InAttention), (Pending, Resolved)]),
            Err(HistoryError::Discontinuous { index: 1, .. })
        );
    }

    #[test]
    fn conflict_messages_name_the_winner() {
        let taken = ClaimConflict::AlreadyClaimed {
            winner_name: Some("Ana".into()),
        };
        assert_eq!(taken.message(), "Conflicto: ya fue tomada por Ana");
        assert_eq!(taken.winner_name(), Some("Ana"));

        let racing = ClaimConflict::InFlight { winner_name: None };
        assert_eq!(racing.message(), "Conflicto: ya fue tomada por otro usuario");

        let done = ClaimConflict::NotPending { state: Resolved };
        assert_eq!(done.message(), "Conflicto: ya está en estado resolved");
        assert_eq!(done.winner_name(), None);
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&InAttention).unwrap(),
            "\"in_attention\""
        );
        assert_eq!(
            serde_json::from_str::<IncidentType>("\"restock\"").unwrap(),
            IncidentType::Restock
        );
    }
}
