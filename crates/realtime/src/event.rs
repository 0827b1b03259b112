//! The notification event envelope.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A typed event on its way to an actor's connections.
///
/// Events are transient: they exist for the duration of dispatch and are
/// never durably stored by this crate. The server-assigned `id` travels on
/// the wire so clients have a stable handle even when the payload carries no
/// entity id.
#[derive(Clone, Debug, Serialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Fan-out addressing only; not part of the wire payload.
    #[serde(skip)]
    pub recipient: Uuid,
    /// Entity snapshot; carries enough to render a message without a
    /// follow-up fetch.
    pub payload: serde_json::Value,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        event_type: impl Into<String>,
        recipient: Uuid,
        payload: serde_json::Value,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            recipient,
            payload,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}
