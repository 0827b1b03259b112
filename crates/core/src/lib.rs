//! # CareSync Core
//!
//! Core business logic for the CareSync coordination platform.
//!
//! This crate contains the status-lifecycle engine: pure entity state
//! machines and derived-field computation:
//! - Consultation, Referral, HealthReport and Feedback entities with
//!   validated status transitions
//! - Priority/urgency derivation as pure, idempotent functions
//! - The escalation sweeper for deadline-driven escalation and
//!   auto-completion, driven by an injected clock
//! - The `EntityStore` seam towards durable storage, plus an in-memory
//!   implementation
//!
//! **No transport concerns**: connection registries, event fan-out and the
//! HTTP/WebSocket servers belong in `caresync-realtime` and the runnable
//! `caresync-run` package.

pub mod consultation;
pub mod error;
pub mod feedback;
pub mod identity;
pub mod notify;
pub mod priority;
pub mod referral;
pub mod report;
pub mod store;
pub mod sweeper;

pub use consultation::{ChannelType, Consultation, ConsultationAction, ConsultationStatus};
pub use error::{CoordinationError, CoordinationResult};
pub use feedback::{Feedback, FeedbackKind, FeedbackStatus, Ratings};
pub use identity::{ActorIdentity, ActorRole};
pub use notify::Notify;
pub use priority::Priority;
pub use referral::{Referral, ReferralPriority, ReferralStatus, UrgencyLevel};
pub use report::{HealthReport, ReportStatus, ReportUrgency, Severity};
pub use store::{EntityStore, MemoryStore};
