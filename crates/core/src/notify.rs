//! Fan-out instructions produced by successful transitions.

use uuid::Uuid;

/// A single fan-out instruction: deliver one typed event to one actor.
///
/// The status engine produces these as pure data; the caller decides how (and
/// whether) to deliver them. Delivery is best-effort and never feeds back
/// into the state change that produced the instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notify {
    /// The actor whose room should receive the event.
    pub recipient: Uuid,
    /// Event type tag, e.g. `"consultation:responded"`.
    pub event_type: &'static str,
    /// Human-readable message synthesised from the acting actor's display name.
    pub message: String,
}

impl Notify {
    pub fn new(recipient: Uuid, event_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            recipient,
            event_type,
            message: message.into(),
        }
    }
}
