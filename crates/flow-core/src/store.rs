//! The flow store.
//!
//! [`FlowStore`] is the single access point for reading, mutating and observing the flow
//! collection. It is built once at startup and shared (`Arc<FlowStore>`) with every consumer.
//!
//! ## Mutation algorithm
//!
//! Every mutation follows the same steps:
//!
//! 1. load the full collection from the backend;
//! 2. replace the first record whose id matches with its transformed copy, leaving every
//!    other record and the order untouched (registration prepends instead);
//! 3. write the full collection back;
//! 4. notify subscribers.
//!
//! A mutation whose id matches nothing is a silent no-op: nothing is written and nobody is
//! notified. Views racing a reload are expected to hit this.
//!
//! ## Concurrency
//!
//! Steps 1-3 run under a store-local lock, so calls through one store apply in call order.
//! Separate stores sharing a backend (other processes, other dashboards on the same device)
//! are *not* coordinated: the whole collection is last-write-wins and a concurrent update can
//! be lost. [`FlowStore::sync_external`] only makes foreign writes visible; it does not merge
//! them.
//!
//! ## Degradations
//!
//! - A slot that has never been written reads as an empty collection.
//! - A slot whose contents cannot be parsed, or that breaks record invariants (a record with
//!   no history, a repeated id), also reads as empty. A warning is logged.
//! - An unreadable or unwritable medium is the only error surfaced to callers.

use crate::backend::{FileBackend, FlowBackend};
use crate::config::FlowConfig;
use crate::constants::ID_ALLOCATION_ATTEMPTS;
use crate::subscriptions::{SubscriberRegistry, Subscription};
use crate::{FlowError, FlowPatient, FlowResult, Stage};
use chrono::Utc;
use flow_types::{EmailAddress, NonEmptyText};
use flow_uuid::PatientId;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

pub struct FlowStore {
    backend: Arc<dyn FlowBackend>,
    subscribers: Arc<SubscriberRegistry>,
    write_lock: Mutex<()>,
    seen_revision: Mutex<u64>,
}

impl FlowStore {
    /// Creates a store over `backend`.
    ///
    /// Data already in the slot is the starting point, not a change: subscribers are only
    /// notified about writes that happen after construction.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StorageRead`] if the backend revision cannot be read.
    pub fn new(backend: impl FlowBackend + 'static) -> FlowResult<Self> {
        Self::with_backend(Arc::new(backend))
    }

    /// Like [`FlowStore::new`] for a backend that is already shared.
    pub fn with_backend(backend: Arc<dyn FlowBackend>) -> FlowResult<Self> {
        let revision = backend.revision()?;
        Ok(Self {
            backend,
            subscribers: Arc::new(SubscriberRegistry::default()),
            write_lock: Mutex::new(()),
            seen_revision: Mutex::new(revision),
        })
    }

    /// Opens the file-backed store described by `cfg`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StorageDirCreation`] if the data directory cannot be created.
    pub fn open(cfg: &FlowConfig) -> FlowResult<Self> {
        let backend = FileBackend::new(cfg.data_dir(), cfg.slot_name())?;
        tracing::info!(slot = %backend.slot_path().display(), "opened flow store");
        Self::new(backend)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Returns the full collection, newest registration first.
    ///
    /// # Errors
    ///
    /// Only fails if the backing medium cannot be read. Missing or corrupt data reads as an
    /// empty collection.
    pub fn get_all(&self) -> FlowResult<Vec<FlowPatient>> {
        let Some(raw) = self.backend.load()? else {
            tracing::debug!("flow slot is empty");
            return Ok(Vec::new());
        };
        Ok(decode_collection(&raw))
    }

    /// Returns the record with `patient_id`, if any.
    pub fn get(&self, patient_id: &PatientId) -> FlowResult<Option<FlowPatient>> {
        Ok(self
            .get_all()?
            .into_iter()
            .find(|p| p.id() == patient_id))
    }

    /// Returns the records currently at `stage`, in store order.
    pub fn by_stage(&self, stage: Stage) -> FlowResult<Vec<FlowPatient>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|p| p.current_stage() == stage)
            .collect())
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Registers a new patient at reception and returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidInput`] for a blank name or malformed email (nothing is
    /// written), [`FlowError::IdAllocation`] if no unused id could be drawn, or a storage
    /// error.
    pub fn register_at_reception(
        &self,
        name: &str,
        email: Option<&str>,
    ) -> FlowResult<FlowPatient> {
        let name = NonEmptyText::new(name).map_err(|e| FlowError::invalid_field("name", e))?;
        let email = email
            .filter(|e| !e.trim().is_empty())
            .map(EmailAddress::parse)
            .transpose()
            .map_err(|e| FlowError::invalid_field("email", e))?;

        let patient = {
            let _guard = self.lock_writes();
            let mut patients = self.get_all()?;

            let taken: HashSet<PatientId> = patients.iter().map(|p| *p.id()).collect();
            let id = (0..ID_ALLOCATION_ATTEMPTS)
                .map(|_| PatientId::new())
                .find(|id| !taken.contains(id))
                .ok_or(FlowError::IdAllocation(ID_ALLOCATION_ATTEMPTS))?;

            let patient = FlowPatient::register(id, name, email, Utc::now());
            patients.insert(0, patient.clone());
            self.persist(&patients)?;
            patient
        };

        tracing::info!(patient_id = %patient.id(), "registered patient at reception");
        self.subscribers.notify();
        Ok(patient)
    }

    /// Moves a patient to `stage`, logging `action` and optional `notes`.
    ///
    /// Returns the updated record, or `None` if no record has `patient_id`.
    pub fn move_stage(
        &self,
        patient_id: &PatientId,
        stage: Stage,
        action: &str,
        notes: Option<&str>,
    ) -> FlowResult<Option<FlowPatient>> {
        let action =
            NonEmptyText::new(action).map_err(|e| FlowError::invalid_field("action", e))?;
        let notes = NonEmptyText::optional(notes);
        let at = Utc::now();

        self.update_patient(patient_id, "move_stage", |p| {
            p.moved_to(stage, action, notes, at)
        })
    }

    /// Routes a patient to consultation in `department`.
    pub fn assign_consultation_department(
        &self,
        patient_id: &PatientId,
        department: &str,
    ) -> FlowResult<Option<FlowPatient>> {
        let department = NonEmptyText::new(department)
            .map_err(|e| FlowError::invalid_field("department", e))?;
        let at = Utc::now();

        self.update_patient(patient_id, "assign_consultation_department", |p| {
            p.with_department(department, at)
        })
    }

    /// Records the doctor seeing a patient. Does not change the stage.
    pub fn assign_doctor(
        &self,
        patient_id: &PatientId,
        doctor: &str,
    ) -> FlowResult<Option<FlowPatient>> {
        let doctor =
            NonEmptyText::new(doctor).map_err(|e| FlowError::invalid_field("doctor", e))?;
        let at = Utc::now();

        self.update_patient(patient_id, "assign_doctor", |p| p.with_doctor(doctor, at))
    }

    /// Adds a lab result. Does not change the stage.
    pub fn add_test_result(
        &self,
        patient_id: &PatientId,
        result: &str,
    ) -> FlowResult<Option<FlowPatient>> {
        let result =
            NonEmptyText::new(result).map_err(|e| FlowError::invalid_field("result", e))?;
        let at = Utc::now();

        self.update_patient(patient_id, "add_test_result", |p| {
            p.with_test_result(result, at)
        })
    }

    /// Adds a prescription. Does not change the stage.
    pub fn add_prescription(
        &self,
        patient_id: &PatientId,
        prescription: &str,
    ) -> FlowResult<Option<FlowPatient>> {
        let prescription = NonEmptyText::new(prescription)
            .map_err(|e| FlowError::invalid_field("prescription", e))?;
        let at = Utc::now();

        self.update_patient(patient_id, "add_prescription", |p| {
            p.with_prescription(prescription, at)
        })
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Registers `callback` to run after every successful write.
    ///
    /// Writes through this store notify before the mutating call returns. Writes by other
    /// stores on the same backend notify once [`FlowStore::sync_external`] observes them.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.subscribers.subscribe(callback)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Checks the backend for writes made by anyone other than this store and notifies
    /// subscribers if there were any. Returns whether a foreign write was seen.
    pub fn sync_external(&self) -> FlowResult<bool> {
        let current = self.backend.revision()?;
        let changed = {
            let mut seen = self
                .seen_revision
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *seen == current {
                false
            } else {
                *seen = current;
                true
            }
        };

        if changed {
            tracing::debug!(revision = current, "observed external flow write");
            self.subscribers.notify();
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn update_patient(
        &self,
        patient_id: &PatientId,
        operation: &'static str,
        transform: impl FnOnce(FlowPatient) -> FlowPatient,
    ) -> FlowResult<Option<FlowPatient>> {
        let updated = {
            let _guard = self.lock_writes();
            let mut patients = self.get_all()?;

            let Some(slot) = patients.iter_mut().find(|p| p.id() == patient_id) else {
                tracing::warn!(%patient_id, operation, "no flow record with this id; ignoring");
                return Ok(None);
            };
            let updated = transform(slot.clone());
            *slot = updated.clone();

            self.persist(&patients)?;
            updated
        };

        tracing::info!(
            %patient_id,
            operation,
            stage = %updated.current_stage(),
            "updated flow record"
        );
        self.subscribers.notify();
        Ok(Some(updated))
    }

    fn persist(&self, patients: &[FlowPatient]) -> FlowResult<()> {
        let raw = serde_json::to_string_pretty(patients).map_err(FlowError::Serialization)?;
        let revision = self.backend.store(&raw)?;
        *self
            .seen_revision
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = revision;
        Ok(())
    }

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for FlowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowStore")
            .field("backend", &self.backend)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Parses slot contents, degrading anything unusable to an empty collection.
fn decode_collection(raw: &str) -> Vec<FlowPatient> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let patients: Vec<FlowPatient> = match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(patients) => patients,
        Err(err) => {
            let path = err.path().to_string();
            let path = if path.is_empty() {
                "<root>"
            } else {
                path.as_str()
            };
            tracing::warn!(path, error = %err.inner(), "flow slot is corrupt; treating as empty");
            return Vec::new();
        }
    };
    if let Err(err) = deserializer.end() {
        tracing::warn!(error = %err, "trailing data in flow slot; treating as empty");
        return Vec::new();
    }

    if let Some(patient) = patients.iter().find(|p| p.history().is_empty()) {
        tracing::warn!(patient_id = %patient.id(), "flow record has no history; treating slot as empty");
        return Vec::new();
    }

    let mut ids = HashSet::with_capacity(patients.len());
    if let Some(patient) = patients.iter().find(|p| !ids.insert(*p.id())) {
        tracing::warn!(patient_id = %patient.id(), "duplicate flow record id; treating slot as empty");
        return Vec::new();
    }

    patients
}
