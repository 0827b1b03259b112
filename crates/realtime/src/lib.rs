//! # CareSync Realtime
//!
//! Real-time notification fan-out: the identity room registry, the event
//! dispatcher and the identity-resolution seam.
//!
//! Delivery semantics are best-effort and at-most-once: a state change must
//! never fail because nobody is listening, a stalled connection must never
//! hold up its room mates, and a failed write is logged and dropped rather
//! than retried.

pub mod dispatch;
pub mod event;
pub mod registry;
pub mod resolver;

pub use dispatch::Dispatcher;
pub use event::NotificationEvent;
pub use registry::{ConnectionId, RoomKey, RoomRegistry};
pub use resolver::{IdentityResolver, TokenTable};
