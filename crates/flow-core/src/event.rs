//! History entries.

use crate::Stage;
use chrono::{DateTime, Utc};
use flow_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// One immutable, timestamped record of a stage transition or annotation.
///
/// Events are only ever created by the record transformations in [`crate::patient`]; there is
/// no way to modify one after construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEvent {
    stage: Stage,
    action: NonEmptyText,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<NonEmptyText>,
}

impl FlowEvent {
    pub(crate) fn new(
        stage: Stage,
        action: NonEmptyText,
        timestamp: DateTime<Utc>,
        notes: Option<NonEmptyText>,
    ) -> Self {
        Self {
            stage,
            action,
            timestamp,
            notes,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn action(&self) -> &str {
        self.action.as_str()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_ref().map(NonEmptyText::as_str)
    }
}
