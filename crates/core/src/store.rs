//! The seam towards durable storage.
//!
//! The core only needs load and save-with-return primitives per entity kind;
//! querying, transactions and concurrent-edit control are the durable
//! store's concern. `MemoryStore` is the in-process implementation used by
//! the server binary and by tests.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::consultation::Consultation;
use crate::error::{CoordinationError, CoordinationResult};
use crate::feedback::Feedback;
use crate::referral::Referral;
use crate::report::HealthReport;

/// Durable CRUD as consumed by the core. Save is assumed atomic per call and
/// returns the stored entity.
pub trait EntityStore: Send + Sync {
    fn load_consultation(&self, id: Uuid) -> CoordinationResult<Consultation>;
    fn save_consultation(&self, consultation: Consultation) -> CoordinationResult<Consultation>;
    fn load_referral(&self, id: Uuid) -> CoordinationResult<Referral>;
    fn save_referral(&self, referral: Referral) -> CoordinationResult<Referral>;
    fn load_report(&self, id: Uuid) -> CoordinationResult<HealthReport>;
    fn save_report(&self, report: HealthReport) -> CoordinationResult<HealthReport>;
    fn load_feedback(&self, id: Uuid) -> CoordinationResult<Feedback>;
    fn save_feedback(&self, feedback: Feedback) -> CoordinationResult<Feedback>;

    /// All consultations, for the periodic sweeper.
    fn list_consultations(&self) -> Vec<Consultation>;
    /// All referrals, for the periodic sweeper.
    fn list_referrals(&self) -> Vec<Referral>;
}

#[derive(Default)]
struct Inner {
    consultations: HashMap<Uuid, Consultation>,
    referrals: HashMap<Uuid, Referral>,
    reports: HashMap<Uuid, HealthReport>,
    feedback: HashMap<Uuid, Feedback>,
}

/// In-memory entity store backed by mutex-protected maps.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic while holding it; the maps hold plain
        // data, so continuing with the inner state is sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EntityStore for MemoryStore {
    fn load_consultation(&self, id: Uuid) -> CoordinationResult<Consultation> {
        self.inner()
            .consultations
            .get(&id)
            .cloned()
            .ok_or(CoordinationError::NotFound {
                kind: "consultation",
                id,
            })
    }

    fn save_consultation(&self, consultation: Consultation) -> CoordinationResult<Consultation> {
        self.inner()
            .consultations
            .insert(consultation.id, consultation.clone());
        Ok(consultation)
    }

    fn load_referral(&self, id: Uuid) -> CoordinationResult<Referral> {
        self.inner()
            .referrals
            .get(&id)
            .cloned()
            .ok_or(CoordinationError::NotFound {
                kind: "referral",
                id,
            })
    }

    fn save_referral(&self, referral: Referral) -> CoordinationResult<Referral> {
        self.inner().referrals.insert(referral.id, referral.clone());
        Ok(referral)
    }

    fn load_report(&self, id: Uuid) -> CoordinationResult<HealthReport> {
        self.inner()
            .reports
            .get(&id)
            .cloned()
            .ok_or(CoordinationError::NotFound { kind: "report", id })
    }

    fn save_report(&self, report: HealthReport) -> CoordinationResult<HealthReport> {
        self.inner().reports.insert(report.id, report.clone());
        Ok(report)
    }

    fn load_feedback(&self, id: Uuid) -> CoordinationResult<Feedback> {
        self.inner()
            .feedback
            .get(&id)
            .cloned()
            .ok_or(CoordinationError::NotFound {
                kind: "feedback",
                id,
            })
    }

    fn save_feedback(&self, feedback: Feedback) -> CoordinationResult<Feedback> {
        self.inner().feedback.insert(feedback.id, feedback.clone());
        Ok(feedback)
    }

    fn list_consultations(&self) -> Vec<Consultation> {
        self.inner().consultations.values().cloned().collect()
    }

    fn list_referrals(&self) -> Vec<Referral> {
        self.inner().referrals.values().cloned().collect()
    }
}
