//! Event anchors: declarative rules that pick one event as a duration boundary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::CREATED_AT_PATH;
use crate::event_type::CaseEventType;
use crate::path;
use crate::types::ValidationError;

/// Which matching event anchors the boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorSelection {
    /// The earliest matching event in history order.
    #[default]
    First,
    /// The latest matching event in history order.
    Last,
}

impl AnchorSelection {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Last => "last",
        }
    }
}

impl fmt::Display for AnchorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AnchorSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            _ => Err(format!("invalid anchor selection: {s}")),
        }
    }
}

/// Selection criteria describing an event boundary for a duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAnchor {
    /// Event type that qualifies for this anchor.
    pub event_type: CaseEventType,

    /// Dot-delimited path to the boundary timestamp. Defaults to the event's
    /// creation time.
    #[serde(default = "default_timestamp_path")]
    pub timestamp_path: String,

    /// Equality filters keyed by dot-delimited path, e.g. `{"data.new": "resolved"}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_filters: BTreeMap<String, Value>,

    /// Whether the first or last matching event is used.
    #[serde(default)]
    pub selection: AnchorSelection,
}

fn default_timestamp_path() -> String {
    CREATED_AT_PATH.to_string()
}

impl EventAnchor {
    /// Creates an anchor on `event_type` using default path, filters and selection.
    #[must_use]
    pub fn new(event_type: CaseEventType) -> Self {
        Self {
            event_type,
            timestamp_path: default_timestamp_path(),
            field_filters: BTreeMap::new(),
            selection: AnchorSelection::First,
        }
    }

    /// Sets the selection strategy.
    #[must_use]
    pub const fn with_selection(mut self, selection: AnchorSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Sets the timestamp path.
    #[must_use]
    pub fn with_timestamp_path(mut self, path: impl Into<String>) -> Self {
        self.timestamp_path = path.into();
        self
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn with_filter(mut self, path: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.field_filters.insert(path.into(), expected.into());
        self
    }

    /// Checks paths are well formed and filters compare against scalars.
    pub fn validate(&self) -> Result<(), ValidationError> {
        path::validate(&self.timestamp_path)?;
        for (filter_path, expected) in &self.field_filters {
            path::validate(filter_path)?;
            if expected.is_object() || expected.is_array() {
                return Err(ValidationError::NonScalarFilter {
                    path: filter_path.clone(),
                });
            }
        }
        Ok(())
    }
}
