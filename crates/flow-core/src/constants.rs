//! Constants used throughout the flow core crate.

/// Default directory for flow data when no explicit directory is configured.
pub const DEFAULT_FLOW_DATA_DIR: &str = "flow_data";

/// Default slot name; the collection lives in `<slot>.json`.
pub const DEFAULT_SLOT_NAME: &str = "patient_flow";

/// File extension of the slot holding the serialized collection.
pub const SLOT_EXTENSION: &str = "json";

/// Default interval between polls for writes made by other processes.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 1_000;

/// Attempts made to draw a patient id not already present in the collection.
pub const ID_ALLOCATION_ATTEMPTS: usize = 5;

/// History action recorded when a patient is registered.
pub const REGISTERED_ACTION: &str = "Registered at reception";

/// History action recorded when a consultation department is assigned.
pub const DEPARTMENT_ASSIGNED_ACTION: &str = "Assigned to consultation department";

/// History action recorded when a doctor is assigned.
pub const DOCTOR_ASSIGNED_ACTION: &str = "Doctor assigned";

/// History action recorded when a test result is added.
pub const TEST_RESULT_ACTION: &str = "Test result added";

/// History action recorded when a prescription is added.
pub const PRESCRIPTION_ACTION: &str = "Prescription added";
