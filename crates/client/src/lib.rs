//! # CareSync Client
//!
//! Client-side notification handling: one logical connection per client
//! process, normalisation of heterogeneous inbound event payloads into a
//! canonical record, and two independent views over the result — an ordered
//! persistent list and a single ephemeral toast slot.

pub mod normalize;
pub mod store;
pub mod subscriber;

pub use normalize::{normalize, Notification};
pub use store::NotificationStore;
pub use subscriber::Subscriber;
