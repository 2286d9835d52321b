//! Realtime fan-out over WebSocket.
//!
//! [`Hub`] keeps the per-event registry of local sockets and publishes
//! domain events to the broker; [`HubLoop`] consumes the broker
//! subscription and delivers each message to the sockets of its event.
//! The upgrade handler runs one writer and one reader task per socket.

mod handler;
pub mod hub;

pub use handler::ws_handler;
pub use hub::{ClientId, Hub, HubClosed, HubConfig, HubLoop, Registration};
