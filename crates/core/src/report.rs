//! Community health report lifecycle.
//!
//! Reports carry an append-only action log and a derived priority that is
//! recomputed whenever severity or urgency changes. Unlike the other
//! entities, a resolved report may be reverted back to pending ("undo
//! resolution") — this backward transition is explicitly supported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoordinationError, CoordinationResult};
use crate::identity::ActorIdentity;
use crate::notify::Notify;
use crate::priority::{report_priority, Priority};

const ENTITY: &str = "report";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportUrgency {
    Routine,
    Urgent,
    Emergency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Investigating,
    Confirmed,
    Resolved,
    FalseAlarm,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Investigating => "investigating",
            ReportStatus::Confirmed => "confirmed",
            ReportStatus::Resolved => "resolved",
            ReportStatus::FalseAlarm => "false_alarm",
        }
    }
}

/// One entry in a report's audit log. Entries are append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportAction {
    pub action: String,
    pub actor: Uuid,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub id: Uuid,
    pub reporter: Uuid,
    pub kind: String,
    pub severity: Severity,
    pub urgency: ReportUrgency,
    pub status: ReportStatus,
    pub priority: Priority,
    pub actions: Vec<ReportAction>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HealthReport {
    /// Creates a pending report. Any authenticated reporter may create one.
    ///
    /// The returned `Notify` acknowledges receipt to the reporter with a
    /// `report:created` event.
    pub fn create(
        reporter: &ActorIdentity,
        kind: impl Into<String>,
        severity: Severity,
        urgency: ReportUrgency,
        now: DateTime<Utc>,
    ) -> (Self, Notify) {
        let report = Self {
            id: Uuid::new_v4(),
            reporter: reporter.id,
            kind: kind.into(),
            severity,
            urgency,
            status: ReportStatus::Pending,
            priority: report_priority(severity, urgency),
            actions: vec![ReportAction {
                action: "created".into(),
                actor: reporter.id,
                timestamp: now,
                notes: None,
            }],
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        let notify = Notify::new(
            reporter.id,
            "report:created",
            format!("Your {} report was received", report.kind),
        );
        (report, notify)
    }

    /// Updates severity, recomputing the derived priority and logging the
    /// change in the audit log.
    pub fn set_severity(
        &self,
        severity: Severity,
        actor: &ActorIdentity,
        now: DateTime<Utc>,
    ) -> HealthReport {
        let mut next = self.clone();
        next.severity = severity;
        next.priority = report_priority(severity, next.urgency);
        next.actions.push(ReportAction {
            action: "severity_changed".into(),
            actor: actor.id,
            timestamp: now,
            notes: None,
        });
        next.updated_at = now;
        next
    }

    /// Updates urgency, recomputing the derived priority and logging the
    /// change in the audit log.
    pub fn set_urgency(
        &self,
        urgency: ReportUrgency,
        actor: &ActorIdentity,
        now: DateTime<Utc>,
    ) -> HealthReport {
        let mut next = self.clone();
        next.urgency = urgency;
        next.priority = report_priority(next.severity, urgency);
        next.actions.push(ReportAction {
            action: "urgency_changed".into(),
            actor: actor.id,
            timestamp: now,
            notes: None,
        });
        next.updated_at = now;
        next
    }

    /// Applies a status transition, logging it in the audit log.
    ///
    /// Permitted transitions:
    /// - pending -> investigating | false_alarm
    /// - investigating -> confirmed | resolved | false_alarm
    /// - confirmed -> resolved
    /// - resolved -> pending (undo resolution; clears `resolved_at`)
    ///
    /// Resolving sets `resolved_at`. The returned `Notify` targets the
    /// reporter with a `report:status` event.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for any pair not listed above.
    pub fn set_status(
        &self,
        new_status: ReportStatus,
        actor: &ActorIdentity,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> CoordinationResult<(HealthReport, Notify)> {
        use ReportStatus::*;

        let allowed = matches!(
            (self.status, new_status),
            (Pending, Investigating)
                | (Pending, FalseAlarm)
                | (Investigating, Confirmed)
                | (Investigating, Resolved)
                | (Investigating, FalseAlarm)
                | (Confirmed, Resolved)
                | (Resolved, Pending)
        );
        if !allowed {
            return Err(CoordinationError::transition(
                ENTITY,
                "set_status",
                format!(
                    "{} -> {} is not a valid report transition",
                    self.status.as_str(),
                    new_status.as_str()
                ),
            ));
        }

        let mut next = self.clone();
        next.status = new_status;
        next.resolved_at = match new_status {
            Resolved => Some(now),
            // Undo resolution reopens the report.
            Pending => None,
            _ => self.resolved_at,
        };
        next.actions.push(ReportAction {
            action: format!("status_{}", new_status.as_str()),
            actor: actor.id,
            timestamp: now,
            notes,
        });
        next.updated_at = now;

        let notify = Notify::new(
            self.reporter,
            "report:status",
            format!(
                "{} marked your report as {}",
                actor.display_name,
                new_status.as_str()
            ),
        );
        Ok((next, notify))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ActorRole;

    fn reporter() -> ActorIdentity {
        ActorIdentity::new(Uuid::new_v4(), ActorRole::Reporter, "Kofi Asante")
    }

    fn investigator() -> ActorIdentity {
        ActorIdentity::new(Uuid::new_v4(), ActorRole::Provider, "Dr Diallo")
    }

    fn new_report(severity: Severity, urgency: ReportUrgency) -> HealthReport {
        let (report, _) =
            HealthReport::create(&reporter(), "outbreak", severity, urgency, Utc::now());
        report
    }

    #[test]
    fn test_create_derives_priority_and_logs() {
        let report = new_report(Severity::Critical, ReportUrgency::Emergency);

        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.priority, Priority::Critical);
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].action, "created");
    }

    #[test]
    fn test_severity_change_recomputes_priority() {
        let report = new_report(Severity::Low, ReportUrgency::Routine);
        assert_eq!(report.priority, Priority::Medium);

        let raised = report.set_severity(Severity::Critical, &investigator(), Utc::now());

        assert_eq!(raised.priority, Priority::High);
        assert_eq!(raised.actions.last().unwrap().action, "severity_changed");
    }

    #[test]
    fn test_urgency_change_recomputes_priority() {
        let report = new_report(Severity::High, ReportUrgency::Routine);
        assert_eq!(report.priority, Priority::High);

        let raised = report.set_urgency(ReportUrgency::Emergency, &investigator(), Utc::now());

        assert_eq!(raised.priority, Priority::Critical);
    }

    #[test]
    fn test_forward_lifecycle_and_resolution_timestamp() {
        let report = new_report(Severity::Medium, ReportUrgency::Urgent);
        let actor = investigator();

        let (investigating, _) = report
            .set_status(ReportStatus::Investigating, &actor, None, Utc::now())
            .unwrap();
        let (confirmed, _) = investigating
            .set_status(ReportStatus::Confirmed, &actor, None, Utc::now())
            .unwrap();
        let now = Utc::now();
        let (resolved, notify) = confirmed
            .set_status(ReportStatus::Resolved, &actor, Some("contained".into()), now)
            .unwrap();

        assert_eq!(resolved.resolved_at, Some(now));
        assert_eq!(notify.recipient, report.reporter);
        assert_eq!(notify.event_type, "report:status");
    }

    #[test]
    fn test_undo_resolution_reopens_report() {
        let report = new_report(Severity::Medium, ReportUrgency::Urgent);
        let actor = investigator();
        let (investigating, _) = report
            .set_status(ReportStatus::Investigating, &actor, None, Utc::now())
            .unwrap();
        let (resolved, _) = investigating
            .set_status(ReportStatus::Resolved, &actor, None, Utc::now())
            .unwrap();

        let (reopened, _) = resolved
            .set_status(ReportStatus::Pending, &actor, None, Utc::now())
            .unwrap();

        assert_eq!(reopened.status, ReportStatus::Pending);
        assert!(reopened.resolved_at.is_none());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let report = new_report(Severity::Low, ReportUrgency::Routine);
        let actor = investigator();

        // pending -> confirmed skips investigation
        let result = report.set_status(ReportStatus::Confirmed, &actor, None, Utc::now());

        match result {
            Err(CoordinationError::InvalidTransition { entity, .. }) => {
                assert_eq!(entity, "report");
            }
            _ => panic!("Expected InvalidTransition error"),
        }
    }

    #[test]
    fn test_audit_log_is_append_only() {
        let report = new_report(Severity::Low, ReportUrgency::Routine);
        let actor = investigator();

        let (investigating, _) = report
            .set_status(ReportStatus::Investigating, &actor, None, Utc::now())
            .unwrap();
        let raised = investigating.set_severity(Severity::High, &actor, Utc::now());

        assert_eq!(raised.actions.len(), 3);
        assert_eq!(raised.actions[0].action, "created");
        assert_eq!(raised.actions[1].action, "status_investigating");
        assert_eq!(raised.actions[2].action, "severity_changed");
    }
}
