use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::event::Event;

/// Envelope for a published event: stable metadata + JSON payload.
///
/// Subscribers of different domains share one bus, so the payload is kept as JSON and
/// routed by `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_id: Uuid,
    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,
    payload: JsonValue,
}

impl EventEnvelope {
    /// Wrap a typed event into an envelope.
    pub fn wrap<E>(event: &E) -> Result<Self, serde_json::Error>
    where
        E: Event + Serialize,
    {
        Ok(Self {
            event_id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload: serde_json::to_value(event)?,
        })
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn into_payload(self) -> JsonValue {
        self.payload
    }
}
