//! Specialist referral lifecycle.
//!
//! A referral is raised by the referring provider, accepted by the receiving
//! provider, and ends completed, cancelled or expired. While pending and past
//! its deadline it is escalated one step at a time by the sweeper (see
//! `sweeper`); priority and urgency never decrease once escalation has
//! occurred.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoordinationError, CoordinationResult};
use crate::identity::ActorIdentity;
use crate::notify::Notify;

const ENTITY: &str = "referral";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralPriority {
    Routine,
    Urgent,
    Emergency,
}

impl ReferralPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralPriority::Routine => "routine",
            ReferralPriority::Urgent => "urgent",
            ReferralPriority::Emergency => "emergency",
        }
    }

    /// One escalation step up; saturates at the ceiling.
    pub fn escalated(self) -> Self {
        match self {
            ReferralPriority::Routine => ReferralPriority::Urgent,
            ReferralPriority::Urgent => ReferralPriority::Emergency,
            ReferralPriority::Emergency => ReferralPriority::Emergency,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Low => "low",
            UrgencyLevel::Medium => "medium",
            UrgencyLevel::High => "high",
            UrgencyLevel::Critical => "critical",
        }
    }

    /// One escalation step up; saturates at the ceiling.
    pub fn escalated(self) -> Self {
        match self {
            UrgencyLevel::Low => UrgencyLevel::Medium,
            UrgencyLevel::Medium => UrgencyLevel::High,
            UrgencyLevel::High => UrgencyLevel::Critical,
            UrgencyLevel::Critical => UrgencyLevel::Critical,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    Expired,
}

impl ReferralStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReferralStatus::Completed | ReferralStatus::Cancelled | ReferralStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Accepted => "accepted",
            ReferralStatus::InProgress => "in_progress",
            ReferralStatus::Completed => "completed",
            ReferralStatus::Cancelled => "cancelled",
            ReferralStatus::Expired => "expired",
        }
    }
}

/// A note on a referral. Notes are append-only: once added an entry is never
/// edited or removed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferralNote {
    pub author: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub patient: Uuid,
    pub referring_provider: Uuid,
    pub referred_to_provider: Option<Uuid>,
    pub kind: String,
    pub specialty: String,
    pub priority: ReferralPriority,
    pub urgency: UrgencyLevel,
    pub deadline: Option<DateTime<Utc>>,
    pub status: ReferralStatus,
    pub notes: Vec<ReferralNote>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Referral {
    /// Creates a pending referral on behalf of the referring provider.
    ///
    /// If a receiving provider is already named, the returned `Notify`
    /// targets them with a `referral:created` event; otherwise creation is
    /// silent until a provider accepts.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        referring: &ActorIdentity,
        patient: Uuid,
        referred_to_provider: Option<Uuid>,
        kind: impl Into<String>,
        specialty: impl Into<String>,
        priority: ReferralPriority,
        urgency: UrgencyLevel,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> (Self, Option<Notify>) {
        let referral = Self {
            id: Uuid::new_v4(),
            patient,
            referring_provider: referring.id,
            referred_to_provider,
            kind: kind.into(),
            specialty: specialty.into(),
            priority,
            urgency,
            deadline,
            status: ReferralStatus::Pending,
            notes: Vec::new(),
            accepted_at: None,
            accepted_by: None,
            created_at: now,
            updated_at: now,
        };
        let notify = referred_to_provider.map(|recipient| {
            Notify::new(
                recipient,
                "referral:created",
                format!(
                    "{} referred a patient for {}",
                    referring.display_name, referral.specialty
                ),
            )
        });
        (referral, notify)
    }

    /// Accepts a pending referral as the receiving provider.
    ///
    /// Sets `accepted_at` and `accepted_by` and, when the referral was raised
    /// without a named receiving provider, records the accepting provider as
    /// such. Notifies the referring provider.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the referral is not pending, or a different
    /// provider was named to receive it.
    pub fn accept(
        &self,
        actor: &ActorIdentity,
        now: DateTime<Utc>,
    ) -> CoordinationResult<(Referral, Notify)> {
        if self.status != ReferralStatus::Pending {
            return Err(CoordinationError::transition(
                ENTITY,
                "accept",
                format!("status is {}", self.status.as_str()),
            ));
        }
        if let Some(named) = self.referred_to_provider {
            if named != actor.id {
                return Err(CoordinationError::transition(
                    ENTITY,
                    "accept",
                    "referral is addressed to a different provider",
                ));
            }
        }

        let mut next = self.clone();
        next.status = ReferralStatus::Accepted;
        next.referred_to_provider = Some(actor.id);
        next.accepted_at = Some(now);
        next.accepted_by = Some(actor.id);
        next.updated_at = now;

        let notify = Notify::new(
            self.referring_provider,
            "referral:accepted",
            format!("{} accepted the referral", actor.display_name),
        );
        Ok((next, notify))
    }

    /// Moves an accepted referral into `in_progress`. Accepting provider only.
    pub fn start(
        &self,
        actor: &ActorIdentity,
        now: DateTime<Utc>,
    ) -> CoordinationResult<(Referral, Notify)> {
        self.require_accepting_provider(actor, "start")?;
        if self.status != ReferralStatus::Accepted {
            return Err(CoordinationError::transition(
                ENTITY,
                "start",
                format!("status is {}", self.status.as_str()),
            ));
        }

        let mut next = self.clone();
        next.status = ReferralStatus::InProgress;
        next.updated_at = now;

        let notify = Notify::new(
            self.referring_provider,
            "referral:started",
            format!("{} started work on the referral", actor.display_name),
        );
        Ok((next, notify))
    }

    /// Completes an accepted or in-progress referral. Accepting provider only.
    pub fn complete(
        &self,
        actor: &ActorIdentity,
        now: DateTime<Utc>,
    ) -> CoordinationResult<(Referral, Notify)> {
        self.require_accepting_provider(actor, "complete")?;
        if !matches!(
            self.status,
            ReferralStatus::Accepted | ReferralStatus::InProgress
        ) {
            return Err(CoordinationError::transition(
                ENTITY,
                "complete",
                format!("status is {}", self.status.as_str()),
            ));
        }

        let mut next = self.clone();
        next.status = ReferralStatus::Completed;
        next.updated_at = now;

        let notify = Notify::new(
            self.referring_provider,
            "referral:completed",
            format!("{} completed the referral", actor.display_name),
        );
        Ok((next, notify))
    }

    /// Cancels a non-terminal referral. Referring provider only.
    pub fn cancel(
        &self,
        actor: &ActorIdentity,
        now: DateTime<Utc>,
    ) -> CoordinationResult<(Referral, Option<Notify>)> {
        if actor.id != self.referring_provider {
            return Err(CoordinationError::transition(
                ENTITY,
                "cancel",
                "only the referring provider may cancel",
            ));
        }
        if self.status.is_terminal() {
            return Err(CoordinationError::transition(
                ENTITY,
                "cancel",
                format!("status is {}", self.status.as_str()),
            ));
        }

        let mut next = self.clone();
        next.status = ReferralStatus::Cancelled;
        next.updated_at = now;

        let notify = self.referred_to_provider.map(|recipient| {
            Notify::new(
                recipient,
                "referral:cancelled",
                format!("{} cancelled the referral", actor.display_name),
            )
        });
        Ok((next, notify))
    }

    /// Appends a note. The note log is append-only; existing entries are
    /// never touched.
    pub fn add_note(
        &self,
        actor: &ActorIdentity,
        body: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoordinationResult<Referral> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(CoordinationError::InvalidInput(
                "note body cannot be empty".into(),
            ));
        }

        let mut next = self.clone();
        next.notes.push(ReferralNote {
            author: actor.id,
            body,
            created_at: now,
        });
        next.updated_at = now;
        Ok(next)
    }

    fn require_accepting_provider(
        &self,
        actor: &ActorIdentity,
        action: &'static str,
    ) -> CoordinationResult<()> {
        if self.accepted_by != Some(actor.id) {
            return Err(CoordinationError::transition(
                ENTITY,
                action,
                "only the accepting provider may perform this action",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ActorRole;

    fn referring() -> ActorIdentity {
        ActorIdentity::new(Uuid::new_v4(), ActorRole::Provider, "Dr Eze")
    }

    fn receiving() -> ActorIdentity {
        ActorIdentity::new(Uuid::new_v4(), ActorRole::Provider, "Dr Mensah")
    }

    fn pending(referring: &ActorIdentity, receiving: Option<Uuid>) -> Referral {
        let (referral, _) = Referral::create(
            referring,
            Uuid::new_v4(),
            receiving,
            "specialist",
            "cardiology",
            ReferralPriority::Routine,
            UrgencyLevel::Low,
            None,
            Utc::now(),
        );
        referral
    }

    #[test]
    fn test_create_notifies_named_provider() {
        let from = referring();
        let to = receiving();
        let (_, notify) = Referral::create(
            &from,
            Uuid::new_v4(),
            Some(to.id),
            "specialist",
            "cardiology",
            ReferralPriority::Urgent,
            UrgencyLevel::Medium,
            None,
            Utc::now(),
        );

        let notify = notify.unwrap();
        assert_eq!(notify.recipient, to.id);
        assert_eq!(notify.event_type, "referral:created");
    }

    #[test]
    fn test_create_without_named_provider_is_silent() {
        let from = referring();
        let (referral, notify) = Referral::create(
            &from,
            Uuid::new_v4(),
            None,
            "specialist",
            "dermatology",
            ReferralPriority::Routine,
            UrgencyLevel::Low,
            None,
            Utc::now(),
        );

        assert!(notify.is_none());
        assert_eq!(referral.status, ReferralStatus::Pending);
    }

    #[test]
    fn test_accept_sets_acceptance_fields_and_notifies_referrer() {
        let from = referring();
        let to = receiving();
        let referral = pending(&from, Some(to.id));
        let now = Utc::now();

        let (accepted, notify) = referral.accept(&to, now).unwrap();

        assert_eq!(accepted.status, ReferralStatus::Accepted);
        assert_eq!(accepted.accepted_by, Some(to.id));
        assert_eq!(accepted.accepted_at, Some(now));
        assert_eq!(notify.recipient, from.id);
        assert_eq!(notify.event_type, "referral:accepted");
    }

    #[test]
    fn test_accept_by_wrong_provider_rejected() {
        let from = referring();
        let to = receiving();
        let other = ActorIdentity::new(Uuid::new_v4(), ActorRole::Provider, "Dr Other");
        let referral = pending(&from, Some(to.id));

        let result = referral.accept(&other, Utc::now());

        assert!(matches!(
            result,
            Err(CoordinationError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_open_referral_accept_claims_it() {
        let from = referring();
        let to = receiving();
        let referral = pending(&from, None);

        let (accepted, _) = referral.accept(&to, Utc::now()).unwrap();

        assert_eq!(accepted.referred_to_provider, Some(to.id));
    }

    #[test]
    fn test_start_then_complete() {
        let from = referring();
        let to = receiving();
        let (accepted, _) = pending(&from, Some(to.id)).accept(&to, Utc::now()).unwrap();

        let (started, notify) = accepted.start(&to, Utc::now()).unwrap();
        assert_eq!(started.status, ReferralStatus::InProgress);
        assert_eq!(notify.event_type, "referral:started");

        let (completed, notify) = started.complete(&to, Utc::now()).unwrap();
        assert_eq!(completed.status, ReferralStatus::Completed);
        assert_eq!(notify.recipient, from.id);
    }

    #[test]
    fn test_cancel_after_completion_rejected() {
        let from = referring();
        let to = receiving();
        let (accepted, _) = pending(&from, Some(to.id)).accept(&to, Utc::now()).unwrap();
        let (completed, _) = accepted.complete(&to, Utc::now()).unwrap();

        let result = completed.cancel(&from, Utc::now());

        assert!(matches!(
            result,
            Err(CoordinationError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_notes_are_append_only() {
        let from = referring();
        let referral = pending(&from, None);

        let with_one = referral.add_note(&from, "first note", Utc::now()).unwrap();
        let with_two = with_one.add_note(&from, "second note", Utc::now()).unwrap();

        assert_eq!(with_two.notes.len(), 2);
        assert_eq!(with_two.notes[0].body, "first note");
        assert_eq!(with_two.notes[1].body, "second note");
    }

    #[test]
    fn test_empty_note_rejected() {
        let from = referring();
        let referral = pending(&from, None);

        let result = referral.add_note(&from, "   ", Utc::now());

        assert!(matches!(result, Err(CoordinationError::InvalidInput(_))));
    }

    #[test]
    fn test_escalation_steps_saturate() {
        assert_eq!(
            ReferralPriority::Routine.escalated(),
            ReferralPriority::Urgent
        );
        assert_eq!(
            ReferralPriority::Emergency.escalated(),
            ReferralPriority::Emergency
        );
        assert_eq!(UrgencyLevel::High.escalated(), UrgencyLevel::Critical);
        assert_eq!(UrgencyLevel::Critical.escalated(), UrgencyLevel::Critical);
    }
}
