//! Deadline-driven escalation and auto-completion.
//!
//! The sweep functions take the current instant as an argument so the caller
//! owns the clock: the server drives them from a periodic task, tests call
//! them with fabricated times. Each returns `Some` only when the entity
//! actually changed, so callers persist and fan out only on change.

use chrono::{DateTime, Utc};

use crate::consultation::{Consultation, ConsultationStatus};
use crate::referral::{Referral, ReferralStatus};

/// Auto-completes a scheduled consultation whose scheduled end has passed.
///
/// Only `scheduled` consultations complete this way: a request the provider
/// never answered must not silently complete, and terminal statuses stay
/// untouched.
pub fn sweep_consultation(consultation: &Consultation, now: DateTime<Utc>) -> Option<Consultation> {
    if consultation.status != ConsultationStatus::Scheduled {
        return None;
    }
    let end = consultation.scheduled_end?;
    if end >= now {
        return None;
    }

    tracing::debug!(
        consultation = %consultation.id,
        "auto-completing consultation past its scheduled end"
    );
    let mut next = consultation.clone();
    next.status = ConsultationStatus::Completed;
    next.updated_at = now;
    Some(next)
}

/// Escalates a pending referral that is past its deadline.
///
/// Advances priority and urgency by exactly one step per invocation; this is
/// deliberately gradual rather than a jump to maximum severity, so repeated
/// sweeps walk an overdue referral up until both reach their ceiling, after
/// which the sweep is a no-op. Escalation never downgrades either field.
pub fn sweep_referral(referral: &Referral, now: DateTime<Utc>) -> Option<Referral> {
    if referral.status != ReferralStatus::Pending {
        return None;
    }
    let deadline = referral.deadline?;
    if now <= deadline {
        return None;
    }

    let priority = referral.priority.escalated();
    let urgency = referral.urgency.escalated();
    if priority == referral.priority && urgency == referral.urgency {
        // Already at ceiling.
        return None;
    }

    tracing::debug!(
        referral = %referral.id,
        priority = ?priority,
        urgency = ?urgency,
        "escalating overdue referral"
    );
    let mut next = referral.clone();
    next.priority = priority;
    next.urgency = urgency;
    next.updated_at = now;
    Some(next)
}
