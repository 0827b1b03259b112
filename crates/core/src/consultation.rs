//! Consultation lifecycle.
//!
//! A consultation is requested by a patient, answered by the provider
//! (scheduled or denied), and ends completed, cancelled or denied. Every
//! successful transition yields exactly one fan-out instruction targeting the
//! counterpart actor: provider actions notify the patient and vice versa.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoordinationError, CoordinationResult};
use crate::identity::ActorIdentity;
use crate::notify::Notify;

const ENTITY: &str = "consultation";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Video,
    Audio,
    Chat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Requested,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Denied,
}

impl ConsultationStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsultationStatus::Completed
                | ConsultationStatus::Cancelled
                | ConsultationStatus::Denied
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Requested => "requested",
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::InProgress => "in_progress",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
            ConsultationStatus::Denied => "denied",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationAction {
    RespondAccept,
    RespondDeny,
    MarkCompleted,
    Cancel,
}

impl ConsultationAction {
    fn as_str(&self) -> &'static str {
        match self {
            ConsultationAction::RespondAccept => "respond_accept",
            ConsultationAction::RespondDeny => "respond_deny",
            ConsultationAction::MarkCompleted => "mark_completed",
            ConsultationAction::Cancel => "cancel",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub patient: Uuid,
    pub provider: Uuid,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub channel: ChannelType,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    /// Creates a consultation request on behalf of a patient.
    ///
    /// The returned `Notify` targets the provider with a
    /// `consultation:requested` event.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScheduleWindow` if both instants are present and the
    /// end does not come after the start.
    pub fn request(
        patient: &ActorIdentity,
        provider: Uuid,
        channel: ChannelType,
        scheduled_start: Option<DateTime<Utc>>,
        scheduled_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoordinationResult<(Self, Notify)> {
        if let (Some(start), Some(end)) = (scheduled_start, scheduled_end) {
            if end <= start {
                return Err(CoordinationError::InvalidScheduleWindow);
            }
        }

        let consultation = Self {
            id: Uuid::new_v4(),
            patient: patient.id,
            provider,
            scheduled_start,
            scheduled_end,
            channel,
            status: ConsultationStatus::Requested,
            created_at: now,
            updated_at: now,
        };
        let notify = Notify::new(
            provider,
            "consultation:requested",
            format!("{} requested a consultation", patient.display_name),
        );
        Ok((consultation, notify))
    }

    /// Applies a lifecycle action on behalf of `actor`.
    ///
    /// Rules:
    /// - `respond_accept` / `respond_deny`: provider only, while `requested`.
    /// - `cancel`: patient or provider, while not terminal.
    /// - `mark_completed`: provider, while `scheduled` or `in_progress`.
    ///
    /// Any action that does not match its preconditions fails with
    /// `InvalidTransition` and leaves the entity unchanged.
    ///
    /// # Returns
    ///
    /// The transitioned consultation and a single fan-out instruction
    /// targeting the counterpart actor.
    pub fn transition(
        &self,
        action: ConsultationAction,
        actor: &ActorIdentity,
        now: DateTime<Utc>,
    ) -> CoordinationResult<(Consultation, Notify)> {
        let (next_status, event_type, verb) = match action {
            ConsultationAction::RespondAccept => {
                self.require_provider(actor, action)?;
                self.require_status(ConsultationStatus::Requested, action)?;
                (
                    ConsultationStatus::Scheduled,
                    "consultation:responded",
                    "accepted",
                )
            }
            ConsultationAction::RespondDeny => {
                self.require_provider(actor, action)?;
                self.require_status(ConsultationStatus::Requested, action)?;
                (
                    ConsultationStatus::Denied,
                    "consultation:responded",
                    "denied",
                )
            }
            ConsultationAction::MarkCompleted => {
                self.require_provider(actor, action)?;
                if !matches!(
                    self.status,
                    ConsultationStatus::Scheduled | ConsultationStatus::InProgress
                ) {
                    return Err(CoordinationError::transition(
                        ENTITY,
                        action.as_str(),
                        format!("status is {}", self.status.as_str()),
                    ));
                }
                (
                    ConsultationStatus::Completed,
                    "consultation:completed",
                    "completed",
                )
            }
            ConsultationAction::Cancel => {
                self.require_participant(actor, action)?;
                if self.status.is_terminal() {
                    return Err(CoordinationError::transition(
                        ENTITY,
                        action.as_str(),
                        format!("status is {}", self.status.as_str()),
                    ));
                }
                (
                    ConsultationStatus::Cancelled,
                    "consultation:cancelled",
                    "cancelled",
                )
            }
        };

        let mut next = self.clone();
        next.status = next_status;
        next.updated_at = now;

        let notify = Notify::new(
            self.counterpart_of(actor.id),
            event_type,
            format!("{} {} the consultation", actor.display_name, verb),
        );
        Ok((next, notify))
    }

    /// The actor on the other side of this consultation.
    pub fn counterpart_of(&self, actor_id: Uuid) -> Uuid {
        if actor_id == self.provider {
            self.patient
        } else {
            self.provider
        }
    }

    fn require_provider(
        &self,
        actor: &ActorIdentity,
        action: ConsultationAction,
    ) -> CoordinationResult<()> {
        if actor.id != self.provider {
            return Err(CoordinationError::transition(
                ENTITY,
                action.as_str(),
                "only the provider may perform this action",
            ));
        }
        Ok(())
    }

    fn require_participant(
        &self,
        actor: &ActorIdentity,
        action: ConsultationAction,
    ) -> CoordinationResult<()> {
        if actor.id != self.provider && actor.id != self.patient {
            return Err(CoordinationError::transition(
                ENTITY,
                action.as_str(),
                "actor is not a participant in this consultation",
            ));
        }
        Ok(())
    }

    fn require_status(
        &self,
        expected: ConsultationStatus,
        action: ConsultationAction,
    ) -> CoordinationResult<()> {
        if self.status != expected {
            return Err(CoordinationError::transition(
                ENTITY,
                action.as_str(),
                format!("status is {}", self.status.as_str()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ActorRole;
    use chrono::Duration;

    fn patient() -> ActorIdentity {
        ActorIdentity::new(Uuid::new_v4(), ActorRole::Patient, "Amina Yusuf")
    }

    fn provider() -> ActorIdentity {
        ActorIdentity::new(Uuid::new_v4(), ActorRole::Provider, "Dr Okafor")
    }

    fn requested(patient: &ActorIdentity, provider: &ActorIdentity) -> Consultation {
        let now = Utc::now();
        let (consultation, _) = Consultation::request(
            patient,
            provider.id,
            ChannelType::Video,
            Some(now + Duration::hours(1)),
            Some(now + Duration::hours(2)),
            now,
        )
        .unwrap();
        consultation
    }

    #[test]
    fn test_request_notifies_provider() {
        let pat = patient();
        let pro = provider();
        let now = Utc::now();
        let (consultation, notify) =
            Consultation::request(&pat, pro.id, ChannelType::Chat, None, None, now).unwrap();

        assert_eq!(consultation.status, ConsultationStatus::Requested);
        assert_eq!(notify.recipient, pro.id);
        assert_eq!(notify.event_type, "consultation:requested");
        assert!(notify.message.contains("Amina Yusuf"));
    }

    #[test]
    fn test_request_rejects_inverted_window() {
        let pat = patient();
        let now = Utc::now();
        let result = Consultation::request(
            &pat,
            Uuid::new_v4(),
            ChannelType::Video,
            Some(now + Duration::hours(2)),
            Some(now + Duration::hours(1)),
            now,
        );

        assert!(matches!(
            result,
            Err(CoordinationError::InvalidScheduleWindow)
        ));
    }

    #[test]
    fn test_provider_accept_schedules_and_notifies_patient() {
        let pat = patient();
        let pro = provider();
        let consultation = requested(&pat, &pro);

        let (next, notify) = consultation
            .transition(ConsultationAction::RespondAccept, &pro, Utc::now())
            .unwrap();

        assert_eq!(next.status, ConsultationStatus::Scheduled);
        assert_eq!(notify.recipient, pat.id);
        assert_eq!(notify.event_type, "consultation:responded");
        assert!(notify.message.contains("Dr Okafor"));
    }

    #[test]
    fn test_provider_deny() {
        let pat = patient();
        let pro = provider();
        let consultation = requested(&pat, &pro);

        let (next, _) = consultation
            .transition(ConsultationAction::RespondDeny, &pro, Utc::now())
            .unwrap();

        assert_eq!(next.status, ConsultationStatus::Denied);
        assert!(next.status.is_terminal());
    }

    #[test]
    fn test_patient_cannot_respond() {
        let pat = patient();
        let pro = provider();
        let consultation = requested(&pat, &pro);

        let result = consultation.transition(ConsultationAction::RespondAccept, &pat, Utc::now());

        match result {
            Err(CoordinationError::InvalidTransition { action, .. }) => {
                assert_eq!(action, "respond_accept");
            }
            _ => panic!("Expected InvalidTransition error"),
        }
    }

    #[test]
    fn test_respond_requires_requested_status() {
        let pat = patient();
        let pro = provider();
        let consultation = requested(&pat, &pro);
        let (scheduled, _) = consultation
            .transition(ConsultationAction::RespondAccept, &pro, Utc::now())
            .unwrap();

        let result = scheduled.transition(ConsultationAction::RespondAccept, &pro, Utc::now());

        assert!(matches!(
            result,
            Err(CoordinationError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_either_party_may_cancel() {
        let pat = patient();
        let pro = provider();

        let (by_patient, notify) = requested(&pat, &pro)
            .transition(ConsultationAction::Cancel, &pat, Utc::now())
            .unwrap();
        assert_eq!(by_patient.status, ConsultationStatus::Cancelled);
        assert_eq!(notify.recipient, pro.id);

        let (by_provider, notify) = requested(&pat, &pro)
            .transition(ConsultationAction::Cancel, &pro, Utc::now())
            .unwrap();
        assert_eq!(by_provider.status, ConsultationStatus::Cancelled);
        assert_eq!(notify.recipient, pat.id);
    }

    #[test]
    fn test_stranger_cannot_cancel() {
        let pat = patient();
        let pro = provider();
        let stranger = ActorIdentity::new(Uuid::new_v4(), ActorRole::Provider, "Dr Someone");
        let consultation = requested(&pat, &pro);

        let result = consultation.transition(ConsultationAction::Cancel, &stranger, Utc::now());

        assert!(matches!(
            result,
            Err(CoordinationError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_cancel_rejected_once_terminal() {
        let pat = patient();
        let pro = provider();
        let (denied, _) = requested(&pat, &pro)
            .transition(ConsultationAction::RespondDeny, &pro, Utc::now())
            .unwrap();

        let result = denied.transition(ConsultationAction::Cancel, &pat, Utc::now());

        assert!(matches!(
            result,
            Err(CoordinationError::InvalidTransition { .. })
        ));
        assert_eq!(denied.status, ConsultationStatus::Denied);
    }

    #[test]
    fn test_mark_completed_requires_scheduled() {
        let pat = patient();
        let pro = provider();
        let consultation = requested(&pat, &pro);

        // Straight from requested it must fail.
        let result = consultation.transition(ConsultationAction::MarkCompleted, &pro, Utc::now());
        assert!(matches!(
            result,
            Err(CoordinationError::InvalidTransition { .. })
        ));

        let (scheduled, _) = consultation
            .transition(ConsultationAction::RespondAccept, &pro, Utc::now())
            .unwrap();
        let (completed, notify) = scheduled
            .transition(ConsultationAction::MarkCompleted, &pro, Utc::now())
            .unwrap();
        assert_eq!(completed.status, ConsultationStatus::Completed);
        assert_eq!(notify.recipient, pat.id);
    }
}
