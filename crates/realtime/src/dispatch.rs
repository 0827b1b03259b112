//! Event fan-out dispatcher.
//!
//! Pushes a typed event to every live connection registered for the target
//! identity. Delivery is best-effort with isolated failures: a write failure
//! on one connection never prevents delivery to the others and never
//! surfaces to the caller, and an empty room is a silent no-op — the state
//! transition that triggered the dispatch must succeed even when nobody is
//! listening.

use std::sync::Arc;

use uuid::Uuid;

use caresync_core::Notify;

use crate::event::NotificationEvent;
use crate::registry::{RoomKey, RoomRegistry};

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RoomRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Delivers one event to every live connection in the recipient's room.
    ///
    /// Writes are non-blocking `try_send`s into each connection's bounded
    /// queue, so a slow or stalled connection sheds this event instead of
    /// stalling its room mates; the miss is logged and dropped.
    ///
    /// # Returns
    ///
    /// The number of connections the event was handed to. Zero is a normal
    /// outcome, not an error.
    pub fn dispatch(
        &self,
        recipient: Uuid,
        event_type: &str,
        payload: serde_json::Value,
        message: &str,
    ) -> usize {
        let event = NotificationEvent::new(event_type, recipient, payload, message);
        let targets = self.registry.senders(&RoomKey::Identity(recipient));
        if targets.is_empty() {
            tracing::debug!(%recipient, event_type, "no live connections, dropping event");
            return 0;
        }

        let mut delivered = 0;
        for (connection, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        %connection,
                        %recipient,
                        event_type,
                        "dropping event for unwritable connection: {e}"
                    );
                }
            }
        }
        delivered
    }

    /// Delivers a fan-out instruction produced by the status engine,
    /// attaching the given entity snapshot as the payload.
    pub fn dispatch_notify(&self, notify: &Notify, payload: serde_json::Value) -> usize {
        self.dispatch(notify.recipient, notify.event_type, payload, &notify.message)
    }
}
