//! Actor identity types shared across the platform.
//!
//! An `ActorIdentity` is the resolved, authenticated view of whoever is
//! performing an action. The display name is used when synthesising
//! human-readable notification messages.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub id: Uuid,
    pub role: ActorRole,
    pub display_name: String,
}

impl ActorIdentity {
    pub fn new(id: Uuid, role: ActorRole, display_name: impl Into<String>) -> Self {
        Self {
            id,
            role,
            display_name: display_name.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Provider,
    Reporter,
}
