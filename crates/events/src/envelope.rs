//! The wire format shared by the broker and WebSocket clients.
//!
//! ```json
//! { "tipo": "incidencia_nueva", "evento_id": "<uuid>", "payload": { ... } }
//! ```

use eventpulse_core::types::DbId;
use serde::{Deserialize, Serialize};

/// Kinds of domain event delivered to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    IncidenciaNueva,
    IncidenciaActualizada,
    IncidenciaConflicto,
    TareaNueva,
    TareaActualizada,
    MensajeNuevo,
    EventoTerminado,
    Ping,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::IncidenciaNueva => "incidencia_nueva",
            EventKind::IncidenciaActualizada => "incidencia_actualizada",
            EventKind::IncidenciaConflicto => "incidencia_conflicto",
            EventKind::TareaNueva => "tarea_nueva",
            EventKind::TareaActualizada => "tarea_actualizada",
            EventKind::MensajeNuevo => "mensaje_nuevo",
            EventKind::EventoTerminado => "evento_terminado",
            EventKind::Ping => "ping",
        }
    }
}

/// A domain event scoped to one EventPulse event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub tipo: EventKind,
    pub evento_id: DbId,
    pub payload: serde_json::Value,
}

/// Routing fields of an envelope; the payload is skipped when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EnvelopeHeader {
    pub tipo: EventKind,
    pub evento_id: DbId,
}

impl Envelope {
    /// Build an envelope, serializing `payload` into JSON.
    pub fn new<T: Serialize>(
        tipo: EventKind,
        evento_id: DbId,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tipo,
            evento_id,
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse just enough of a raw envelope to route it.
    pub fn peek(raw: &str) -> Result<EnvelopeHeader, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
