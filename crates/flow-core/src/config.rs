//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the flow store.
//! Nothing in the core reads environment variables while handling a request; the binaries
//! read them and hand the raw values to the parsing helpers below.

use crate::constants::{DEFAULT_SYNC_INTERVAL_MS, SLOT_EXTENSION};
use crate::{FlowError, FlowResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct FlowConfig {
    data_dir: PathBuf,
    slot_name: String,
    sync_interval: Duration,
}

impl FlowConfig {
    /// Create a new `FlowConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidInput`] if `slot_name` is empty or contains anything other
    /// than ASCII letters, digits, `-` and `_`, or if `sync_interval` is zero.
    pub fn new(
        data_dir: PathBuf,
        slot_name: impl Into<String>,
        sync_interval: Duration,
    ) -> FlowResult<Self> {
        let slot_name = slot_name.into();
        validate_slot_name(&slot_name)?;

        if sync_interval.is_zero() {
            return Err(FlowError::InvalidInput(
                "sync interval must be greater than zero".into(),
            ));
        }

        Ok(Self {
            data_dir,
            slot_name,
            sync_interval,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }

    /// Path of the JSON file holding the flow collection.
    pub fn slot_path(&self) -> PathBuf {
        slot_file(&self.data_dir, &self.slot_name, SLOT_EXTENSION)
    }
}

pub(crate) fn slot_file(dir: &Path, slot_name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{slot_name}.{extension}"))
}

pub(crate) fn validate_slot_name(slot_name: &str) -> FlowResult<()> {
    if slot_name.is_empty() {
        return Err(FlowError::InvalidInput("slot name cannot be empty".into()));
    }
    if !slot_name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(FlowError::InvalidInput(format!(
            "slot name may only contain ASCII letters, digits, '-' and '_', got: '{slot_name}'"
        )));
    }
    Ok(())
}

/// Parse the sync interval from an optional millisecond value.
///
/// If `value` is `None` or empty/whitespace, returns the default interval.
pub fn sync_interval_from_env_value(value: Option<String>) -> FlowResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let millis = match value {
        Some(v) => v.parse::<u64>().map_err(|e| {
            FlowError::InvalidInput(format!("FLOW_SYNC_INTERVAL_MS is not a number: {e}"))
        })?,
        None => DEFAULT_SYNC_INTERVAL_MS,
    };

    Ok(Duration::from_millis(millis))
}
