//! Patient flow records.
//!
//! A [`FlowPatient`] is never edited in place. Each mutation is a pure transformation that
//! consumes the old record and returns the new one, prepending exactly one [`FlowEvent`] to
//! the history. Tests, prescriptions and history are all kept most-recent-first.
//!
//! Two kinds of transformation exist:
//! - *transitions* ([`FlowPatient::moved_to`], [`FlowPatient::with_department`]) change
//!   `current_stage` and log an event for the new stage;
//! - *annotations* ([`FlowPatient::with_test_result`], [`FlowPatient::with_prescription`],
//!   [`FlowPatient::with_doctor`]) log an event tagged with the stage the work belongs to but
//!   leave `current_stage` alone.

use crate::constants::{
    DEPARTMENT_ASSIGNED_ACTION, DOCTOR_ASSIGNED_ACTION, PRESCRIPTION_ACTION, REGISTERED_ACTION,
    TEST_RESULT_ACTION,
};
use crate::{FlowEvent, Stage};
use chrono::{DateTime, Utc};
use flow_types::{EmailAddress, NonEmptyText};
use flow_uuid::PatientId;
use serde::{Deserialize, Serialize};

/// Aggregate root for one patient's journey.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPatient {
    id: PatientId,
    name: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<EmailAddress>,
    current_stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    consultation_department: Option<NonEmptyText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assigned_doctor: Option<NonEmptyText>,
    #[serde(default)]
    tests: Vec<NonEmptyText>,
    #[serde(default)]
    prescriptions: Vec<NonEmptyText>,
    history: Vec<FlowEvent>,
}

impl FlowPatient {
    /// Builds a freshly registered record sitting at reception.
    pub(crate) fn register(
        id: PatientId,
        name: NonEmptyText,
        email: Option<EmailAddress>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            current_stage: Stage::Reception,
            consultation_department: None,
            assigned_doctor: None,
            tests: Vec::new(),
            prescriptions: Vec::new(),
            history: vec![FlowEvent::new(
                Stage::Reception,
                fixed_action(REGISTERED_ACTION),
                at,
                None,
            )],
        }
    }

    pub fn id(&self) -> &PatientId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn email(&self) -> Option<&EmailAddress> {
        self.email.as_ref()
    }

    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    pub fn consultation_department(&self) -> Option<&str> {
        self.consultation_department
            .as_ref()
            .map(NonEmptyText::as_str)
    }

    pub fn assigned_doctor(&self) -> Option<&str> {
        self.assigned_doctor.as_ref().map(NonEmptyText::as_str)
    }

    /// Test results, most recent first.
    pub fn tests(&self) -> impl ExactSizeIterator<Item = &str> {
        self.tests.iter().map(NonEmptyText::as_str)
    }

    /// Prescriptions, most recent first.
    pub fn prescriptions(&self) -> impl ExactSizeIterator<Item = &str> {
        self.prescriptions.iter().map(NonEmptyText::as_str)
    }

    /// Full history, most recent first. Never empty for a record built by this crate.
    pub fn history(&self) -> &[FlowEvent] {
        &self.history
    }

    /// The most recent history entry.
    pub fn latest_event(&self) -> Option<&FlowEvent> {
        self.history.first()
    }

    /// Moves the patient to `stage` and logs the transition.
    pub fn moved_to(
        mut self,
        stage: Stage,
        action: NonEmptyText,
        notes: Option<NonEmptyText>,
        at: DateTime<Utc>,
    ) -> Self {
        self.current_stage = stage;
        self.prepend_event(FlowEvent::new(stage, action, at, notes));
        self
    }

    /// Routes the patient to consultation with the given department.
    pub fn with_department(mut self, department: NonEmptyText, at: DateTime<Utc>) -> Self {
        self.current_stage = Stage::Consultation;
        self.consultation_department = Some(department.clone());
        self.prepend_event(FlowEvent::new(
            Stage::Consultation,
            fixed_action(DEPARTMENT_ASSIGNED_ACTION),
            at,
            Some(department),
        ));
        self
    }

    /// Records the doctor responsible for the consultation. Stage is unchanged.
    pub fn with_doctor(mut self, doctor: NonEmptyText, at: DateTime<Utc>) -> Self {
        self.assigned_doctor = Some(doctor.clone());
        self.prepend_event(FlowEvent::new(
            Stage::Consultation,
            fixed_action(DOCTOR_ASSIGNED_ACTION),
            at,
            Some(doctor),
        ));
        self
    }

    /// Adds a lab result. A result alone does not move the patient out of their stage.
    pub fn with_test_result(mut self, result: NonEmptyText, at: DateTime<Utc>) -> Self {
        self.tests.insert(0, result.clone());
        self.prepend_event(FlowEvent::new(
            Stage::Lab,
            fixed_action(TEST_RESULT_ACTION),
            at,
            Some(result),
        ));
        self
    }

    /// Adds a prescription. Stage is unchanged.
    pub fn with_prescription(mut self, prescription: NonEmptyText, at: DateTime<Utc>) -> Self {
        self.prescriptions.insert(0, prescription.clone());
        self.prepend_event(FlowEvent::new(
            Stage::Consultation,
            fixed_action(PRESCRIPTION_ACTION),
            at,
            Some(prescription),
        ));
        self
    }

    fn prepend_event(&mut self, event: FlowEvent) {
        self.history.insert(0, event);
    }
}

// Action constants are non-blank literals.
fn fixed_action(action: &'static str) -> NonEmptyText {
    NonEmptyText::new(action).unwrap_or_else(|_| unreachable!("blank action constant"))
}
