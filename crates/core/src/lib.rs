//! EventPulse domain core.
//!
//! Pure domain types and rules with no I/O: identifiers, the error
//! taxonomy, roles, lifecycle enums, the incident state machine and input
//! validation. Everything here is shared by the database, broker and HTTP
//! layers.

pub mod error;
pub mod event;
pub mod incident;
pub mod roles;
pub mod task;
pub mod types;
pub mod validation;
