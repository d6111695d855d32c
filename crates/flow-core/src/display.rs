//! Rendering defaults for consumers.
//!
//! Optional record fields stay `Option` inside the core; dashboards, the REST view model and
//! the CLI all call these helpers so a missing department or doctor is shown the same way
//! everywhere.

/// Shown in place of a department or doctor that has not been assigned yet.
pub const UNASSIGNED: &str = "Unassigned";

/// Shown in place of a missing email address.
pub const NO_EMAIL: &str = "-";

pub fn or_unassigned(value: Option<&str>) -> &str {
    value.unwrap_or(UNASSIGNED)
}
