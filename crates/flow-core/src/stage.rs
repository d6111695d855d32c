//! Stage vocabulary.
//!
//! The closed set of places a patient can be in during their stay, and the label each one is
//! shown with. The main outpatient path runs reception → triage → consultation → lab →
//! billing → pharmacy → completed; `ward`, `icu`, `maternity` and `nutrition` are the
//! inpatient and specialist branches the department dashboards route patients into.

use crate::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One discrete phase of a patient's hospital journey.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Reception,
    Triage,
    Consultation,
    Lab,
    Billing,
    Pharmacy,
    Completed,
    Ward,
    Icu,
    Maternity,
    Nutrition,
}

impl Stage {
    /// Every stage, main path first and branches after.
    pub const ALL: [Stage; 11] = [
        Stage::Reception,
        Stage::Triage,
        Stage::Consultation,
        Stage::Lab,
        Stage::Billing,
        Stage::Pharmacy,
        Stage::Completed,
        Stage::Ward,
        Stage::Icu,
        Stage::Maternity,
        Stage::Nutrition,
    ];

    /// Wire name, as persisted and accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Reception => "reception",
            Stage::Triage => "triage",
            Stage::Consultation => "consultation",
            Stage::Lab => "lab",
            Stage::Billing => "billing",
            Stage::Pharmacy => "pharmacy",
            Stage::Completed => "completed",
            Stage::Ward => "ward",
            Stage::Icu => "icu",
            Stage::Maternity => "maternity",
            Stage::Nutrition => "nutrition",
        }
    }

    /// Human-readable label for dashboards.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Reception => "Reception",
            Stage::Triage => "Triage",
            Stage::Consultation => "Consultation",
            Stage::Lab => "Laboratory",
            Stage::Billing => "Billing",
            Stage::Pharmacy => "Pharmacy",
            Stage::Completed => "Completed",
            Stage::Ward => "Ward",
            Stage::Icu => "ICU",
            Stage::Maternity => "Maternity",
            Stage::Nutrition => "Nutrition",
        }
    }

    /// `completed` ends the journey. It is still a stage value; records are never deleted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == needle)
            .ok_or_else(|| FlowError::UnknownStage(s.to_string()))
    }
}
