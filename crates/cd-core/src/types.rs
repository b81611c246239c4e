//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for identifiers and duration definitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The provided value exceeded its maximum length.
    #[error("{field} must be at most {max} characters, got {len}")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    /// A dot-delimited field path was malformed.
    #[error("invalid field path '{path}': segments cannot be empty")]
    InvalidPath { path: String },

    /// A field filter expected a structured value instead of a scalar.
    #[error("filter on '{path}' must compare against a scalar value")]
    NonScalarFilter { path: String },

    /// A duration's end boundary precedes its start boundary.
    #[error("end {end} precedes start {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated case event identifier.
    EventId, "event ID"
);

define_string_id!(
    /// A validated case identifier.
    ///
    /// A case is the entity whose lifecycle events are measured. Each case
    /// belongs to exactly one workspace.
    CaseId, "case ID"
);

define_string_id!(
    /// A validated workspace identifier.
    ///
    /// Workspaces scope both cases and the duration definitions that apply to them.
    WorkspaceId, "workspace ID"
);

define_string_id!(
    /// A validated duration definition identifier.
    DefinitionId, "definition ID"
);

impl DefinitionId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
