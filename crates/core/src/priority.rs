//! Derived priority computation.
//!
//! Priority is never stored independently of its inputs: it is recomputed
//! whenever severity, urgency or ratings change, so it is always consistent
//! with them. Both derivations are pure functions with no hidden memory;
//! identical inputs always yield identical output.

use serde::{Deserialize, Serialize};

use crate::feedback::{FeedbackKind, Ratings};
use crate::report::{ReportUrgency, Severity};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Derives a health report's priority from its severity and urgency.
///
/// severity scores critical=4, high=3, medium=2, low=1; urgency scores
/// emergency=3, urgent=2, routine=1. The sum maps to critical at >= 6,
/// high at >= 4, medium at >= 2, else low.
pub fn report_priority(severity: Severity, urgency: ReportUrgency) -> Priority {
    let severity_score = match severity {
        Severity::Critical => 4,
        Severity::High => 3,
        Severity::Medium => 2,
        Severity::Low => 1,
    };
    let urgency_score = match urgency {
        ReportUrgency::Emergency => 3,
        ReportUrgency::Urgent => 2,
        ReportUrgency::Routine => 1,
    };

    match severity_score + urgency_score {
        total if total >= 6 => Priority::Critical,
        total if total >= 4 => Priority::High,
        total if total >= 2 => Priority::Medium,
        _ => Priority::Low,
    }
}

/// Derives feedback priority from the average of all ratings present.
///
/// average <= 2 is high, <= 3 medium, else low; overridden to critical for
/// medication and care-quality feedback whose average is <= 2.
pub fn feedback_priority(kind: FeedbackKind, ratings: &Ratings) -> Priority {
    let average = ratings.average();

    if average <= 2.0
        && matches!(kind, FeedbackKind::Medication | FeedbackKind::CareQuality)
    {
        return Priority::Critical;
    }

    if average <= 2.0 {
        Priority::High
    } else if average <= 3.0 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_priority_table() {
        assert_eq!(
            report_priority(Severity::Critical, ReportUrgency::Emergency),
            Priority::Critical
        );
        assert_eq!(
            report_priority(Severity::Critical, ReportUrgency::Urgent),
            Priority::Critical
        );
        assert_eq!(
            report_priority(Severity::High, ReportUrgency::Routine),
            Priority::High
        );
        assert_eq!(
            report_priority(Severity::Medium, ReportUrgency::Urgent),
            Priority::High
        );
        assert_eq!(
            report_priority(Severity::Medium, ReportUrgency::Routine),
            Priority::Medium
        );
        assert_eq!(
            report_priority(Severity::Low, ReportUrgency::Routine),
            Priority::Medium
        );
    }

    #[test]
    fn test_report_priority_is_idempotent() {
        // Fixed inputs must yield the same priority on every call.
        let first = report_priority(Severity::High, ReportUrgency::Urgent);
        for _ in 0..100 {
            assert_eq!(report_priority(Severity::High, ReportUrgency::Urgent), first);
        }
    }

    #[test]
    fn test_feedback_thresholds() {
        let low = Ratings::overall_only(5).unwrap();
        assert_eq!(feedback_priority(FeedbackKind::Service, &low), Priority::Low);

        let medium = Ratings::overall_only(3).unwrap();
        assert_eq!(
            feedback_priority(FeedbackKind::Service, &medium),
            Priority::Medium
        );

        let high = Ratings::overall_only(2).unwrap();
        assert_eq!(
            feedback_priority(FeedbackKind::Service, &high),
            Priority::High
        );
    }

    #[test]
    fn test_medication_override_beats_plain_high() {
        // overall=2 would already be "high" by threshold; the medication
        // category forces critical instead.
        let ratings = Ratings::overall_only(2).unwrap();

        assert_eq!(
            feedback_priority(FeedbackKind::Medication, &ratings),
            Priority::Critical
        );
        assert_eq!(
            feedback_priority(FeedbackKind::CareQuality, &ratings),
            Priority::Critical
        );
        assert_eq!(
            feedback_priority(FeedbackKind::Facility, &ratings),
            Priority::High
        );
    }

    #[test]
    fn test_component_ratings_shift_average() {
        let ratings = Ratings::new(1, Some(5), Some(5), Some(5), Some(5)).unwrap();
        // average 4.2, well above both thresholds
        assert_eq!(
            feedback_priority(FeedbackKind::Medication, &ratings),
            Priority::Low
        );
    }
}
