//! Patient flow identifiers.
//!
//! Every flow record is keyed by a [`PatientId`]: a random UUID v4 held in a *canonical*
//! representation of **32 lowercase hexadecimal characters** (no hyphens).
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Canonical form is *required* for identifiers supplied from outside the core (REST paths, CLI
//! arguments, persisted JSON). Use [`PatientId::parse`] to validate them; uppercase or
//! hyphenated forms are rejected rather than normalised, so two spellings of one id can never
//! coexist in a collection.

mod id;

pub use id::{PatientId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
