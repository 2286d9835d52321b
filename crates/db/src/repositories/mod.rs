//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument. Multi-statement writes run
//! inside a single transaction.

pub mod event_repo;
pub mod incident_repo;
pub mod message_repo;
pub mod task_repo;
pub mod user_repo;
pub mod zone_repo;

pub use event_repo::EventRepo;
pub use incident_repo::IncidentRepo;
pub use message_repo::MessageRepo;
pub use task_repo::TaskRepo;
pub use user_repo::UserRepo;
pub use zone_repo::ZoneRepo;
