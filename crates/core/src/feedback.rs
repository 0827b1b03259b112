//! Patient feedback lifecycle.
//!
//! Feedback carries an overall rating plus up to four optional component
//! ratings; its priority is derived from the average of whatever is present
//! and recomputed on every rating change. A provider response moves the
//! feedback to `addressed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoordinationError, CoordinationResult};
use crate::identity::ActorIdentity;
use crate::notify::Notify;
use crate::priority::{feedback_priority, Priority};

const ENTITY: &str = "feedback";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Medication,
    CareQuality,
    Service,
    Facility,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Pending,
    Reviewed,
    Addressed,
    Resolved,
    Closed,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::Reviewed => "reviewed",
            FeedbackStatus::Addressed => "addressed",
            FeedbackStatus::Resolved => "resolved",
            FeedbackStatus::Closed => "closed",
        }
    }
}

/// Overall rating plus optional component ratings, all on a 1-5 scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratings {
    pub overall: u8,
    pub communication: Option<u8>,
    pub timeliness: Option<u8>,
    pub professionalism: Option<u8>,
    pub effectiveness: Option<u8>,
}

impl Ratings {
    /// Builds and validates a rating set. Every rating present must be 1-5.
    pub fn new(
        overall: u8,
        communication: Option<u8>,
        timeliness: Option<u8>,
        professionalism: Option<u8>,
        effectiveness: Option<u8>,
    ) -> CoordinationResult<Self> {
        let ratings = Self {
            overall,
            communication,
            timeliness,
            professionalism,
            effectiveness,
        };
        for value in ratings.present() {
            if !(1..=5).contains(&value) {
                return Err(CoordinationError::RatingOutOfRange);
            }
        }
        Ok(ratings)
    }

    pub fn overall_only(overall: u8) -> CoordinationResult<Self> {
        Self::new(overall, None, None, None, None)
    }

    /// Average over all ratings present; the overall rating is always one of
    /// them.
    pub fn average(&self) -> f64 {
        let present = self.present();
        let sum: u32 = present.iter().map(|&v| u32::from(v)).sum();
        f64::from(sum) / present.len() as f64
    }

    fn present(&self) -> Vec<u8> {
        let mut values = vec![self.overall];
        for component in [
            self.communication,
            self.timeliness,
            self.professionalism,
            self.effectiveness,
        ]
        .into_iter()
        .flatten()
        {
            values.push(component);
        }
        values
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub content: String,
    pub responder: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub patient: Uuid,
    pub provider: Option<Uuid>,
    pub kind: FeedbackKind,
    pub ratings: Ratings,
    pub status: FeedbackStatus,
    pub priority: Priority,
    pub response: Option<FeedbackResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feedback {
    /// Creates pending feedback on behalf of a patient, deriving its
    /// priority from the ratings.
    pub fn create(
        patient: &ActorIdentity,
        provider: Option<Uuid>,
        kind: FeedbackKind,
        ratings: Ratings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient: patient.id,
            provider,
            kind,
            ratings,
            status: FeedbackStatus::Pending,
            priority: feedback_priority(kind, &ratings),
            response: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the ratings, recomputing the derived priority.
    pub fn set_ratings(&self, ratings: Ratings, now: DateTime<Utc>) -> Feedback {
        let mut next = self.clone();
        next.ratings = ratings;
        next.priority = feedback_priority(next.kind, &ratings);
        next.updated_at = now;
        next
    }

    /// Records a response and moves the feedback to `addressed`.
    ///
    /// The returned `Notify` targets the patient with a `feedback:response`
    /// event.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the feedback is already closed or has already
    /// been responded to.
    pub fn respond(
        &self,
        responder: &ActorIdentity,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoordinationResult<(Feedback, Notify)> {
        if self.status == FeedbackStatus::Closed {
            return Err(CoordinationError::transition(
                ENTITY,
                "respond",
                "feedback is closed",
            ));
        }
        if self.response.is_some() {
            return Err(CoordinationError::transition(
                ENTITY,
                "respond",
                "feedback has already been responded to",
            ));
        }

        let mut next = self.clone();
        next.status = FeedbackStatus::Addressed;
        next.response = Some(FeedbackResponse {
            content: content.into(),
            responder: responder.id,
            created_at: now,
        });
        next.updated_at = now;

        let notify = Notify::new(
            self.patient,
            "feedback:response",
            format!("{} responded to your feedback", responder.display_name),
        );
        Ok((next, notify))
    }

    /// Applies a review-workflow status change.
    ///
    /// Permitted: pending -> reviewed, addressed -> resolved,
    /// resolved -> closed, and any non-closed status -> closed.
    pub fn set_status(
        &self,
        new_status: FeedbackStatus,
        now: DateTime<Utc>,
    ) -> CoordinationResult<Feedback> {
        use FeedbackStatus::*;

        let allowed = matches!(
            (self.status, new_status),
            (Pending, Reviewed) | (Addressed, Resolved) | (Resolved, Closed)
        ) || (new_status == Closed && self.status != Closed);
        if !allowed {
            return Err(CoordinationError::transition(
                ENTITY,
                "set_status",
                format!(
                    "{} -> {} is not a valid feedback transition",
                    self.status.as_str(),
                    new_status.as_str()
                ),
            ));
        }

        let mut next = self.clone();
        next.status = new_status;
        next.updated_at = now;
        Ok(next)
    }
}
