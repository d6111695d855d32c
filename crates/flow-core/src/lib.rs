//! # Flow Core
//!
//! Patient flow tracking for the hospital operations dashboards.
//!
//! This crate models a patient's journey through the hospital as a small state machine with
//! an append-only history, and keeps any number of dashboard views in step with it:
//! - [`Stage`]: the closed stage vocabulary and its display labels
//! - [`FlowEvent`]: one immutable history entry
//! - [`FlowPatient`]: the per-patient aggregate, changed only by pure transformations
//! - [`FlowStore`]: persistence, mutation operations and change subscriptions
//! - [`FlowBackend`]: the storage medium ([`FileBackend`], [`MemoryBackend`])
//!
//! **No API concerns**: HTTP handlers, SSE streaming and command-line parsing belong in
//! `api-rest` and `flow-cli`.

pub mod backend;
pub mod config;
pub mod constants;
pub mod display;
pub mod error;
pub mod event;
pub mod patient;
pub mod stage;
pub mod store;
pub mod subscriptions;

pub use backend::{FileBackend, FlowBackend, MemoryBackend};
pub use config::{sync_interval_from_env_value, FlowConfig};
pub use constants::{DEFAULT_FLOW_DATA_DIR, DEFAULT_SLOT_NAME};
pub use error::{FlowError, FlowResult};
pub use event::FlowEvent;
pub use patient::FlowPatient;
pub use stage::Stage;
pub use store::FlowStore;
pub use subscriptions::Subscription;

// Re-export the validated primitives that appear in the public API.
pub use flow_types::{EmailAddress, NonEmptyText, TextError};
pub use flow_uuid::PatientId;
