//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the (joined) row
//! - A create DTO for inserts
//! - Where the entity is editable, a patch DTO (all `Option` fields)

pub mod event;
pub mod incident;
pub mod message;
pub mod task;
pub mod user;
pub mod zone;
