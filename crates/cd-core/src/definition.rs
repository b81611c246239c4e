//! Duration definitions: a named pairing of a start anchor and an end anchor.

use serde::{Deserialize, Serialize};

use crate::anchor::EventAnchor;
use crate::types::{DefinitionId, ValidationError};

/// Maximum length of a definition name.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of a definition description.
pub const MAX_DESCRIPTION_LEN: usize = 1024;

/// A validated duration definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationDefinition {
    pub id: DefinitionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_anchor: EventAnchor,
    pub end_anchor: EventAnchor,
}

impl DurationDefinition {
    /// Builds a definition from a draft after validating it.
    pub fn from_draft(id: DefinitionId, draft: DefinitionDraft) -> Result<Self, ValidationError> {
        draft.validate()?;
        Ok(Self {
            id,
            name: draft.name.trim().to_string(),
            description: draft.description,
            start_anchor: draft.start_anchor,
            end_anchor: draft.end_anchor,
        })
    }

    /// Returns a copy with `patch` applied, re-validated.
    pub fn patched(&self, patch: DefinitionPatch) -> Result<Self, ValidationError> {
        let draft = DefinitionDraft {
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            description: match patch.description {
                Some(description) => description,
                None => self.description.clone(),
            },
            start_anchor: patch
                .start_anchor
                .unwrap_or_else(|| self.start_anchor.clone()),
            end_anchor: patch.end_anchor.unwrap_or_else(|| self.end_anchor.clone()),
        };
        Self::from_draft(self.id.clone(), draft)
    }
}

/// Input for creating a duration definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_anchor: EventAnchor,
    pub end_anchor: EventAnchor,
}

impl DefinitionDraft {
    /// Checks name and description limits and both anchors.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        check_len("name", name, MAX_NAME_LEN)?;
        if let Some(description) = &self.description {
            check_len("description", description, MAX_DESCRIPTION_LEN)?;
        }
        self.start_anchor.validate()?;
        self.end_anchor.validate()
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, max, len });
    }
    Ok(())
}

/// Partial update for a duration definition.
///
/// `description` distinguishes "leave unchanged" (field omitted) from
/// "clear" (explicit `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_anchor: Option<EventAnchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_anchor: Option<EventAnchor>,
}

impl DefinitionPatch {
    /// Returns true when the patch changes nothing.
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.start_anchor.is_none()
            && self.end_anchor.is_none()
    }
}

/// Maps a present field, including an explicit `null`, to `Some`.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
