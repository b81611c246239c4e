//! Case event type enum as the single source of truth for event type strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle event types that an anchor can select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseEventType {
    CaseCreated,
    CaseUpdated,
    CaseClosed,
    CaseReopened,
    CaseViewed,
    StatusChanged,
    PriorityChanged,
    SeverityChanged,
    AssigneeChanged,
    FieldsChanged,
    PayloadChanged,
    TagAdded,
    TagRemoved,
    AttachmentCreated,
    AttachmentDeleted,
}

impl CaseEventType {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 15] = [
        Self::CaseCreated,
        Self::CaseUpdated,
        Self::CaseClosed,
        Self::CaseReopened,
        Self::CaseViewed,
        Self::StatusChanged,
        Self::PriorityChanged,
        Self::SeverityChanged,
        Self::AssigneeChanged,
        Self::FieldsChanged,
        Self::PayloadChanged,
        Self::TagAdded,
        Self::TagRemoved,
        Self::AttachmentCreated,
        Self::AttachmentDeleted,
    ];

    /// Canonical string form, used for storage and serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CaseCreated => "case_created",
            Self::CaseUpdated => "case_updated",
            Self::CaseClosed => "case_closed",
            Self::CaseReopened => "case_reopened",
            Self::CaseViewed => "case_viewed",
            Self::StatusChanged => "status_changed",
            Self::PriorityChanged => "priority_changed",
            Self::SeverityChanged => "severity_changed",
            Self::AssigneeChanged => "assignee_changed",
            Self::FieldsChanged => "fields_changed",
            Self::PayloadChanged => "payload_changed",
            Self::TagAdded => "tag_added",
            Self::TagRemoved => "tag_removed",
            Self::AttachmentCreated => "attachment_created",
            Self::AttachmentDeleted => "attachment_deleted",
        }
    }
}

impl fmt::Display for CaseEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CaseEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "case_created" | "opened" => Ok(Self::CaseCreated),
            "case_updated" => Ok(Self::CaseUpdated),
            "case_closed" | "closed" => Ok(Self::CaseClosed),
            "case_reopened" | "reopened" => Ok(Self::CaseReopened),
            "case_viewed" => Ok(Self::CaseViewed),
            "status_changed" => Ok(Self::StatusChanged),
            "priority_changed" => Ok(Self::PriorityChanged),
            "severity_changed" => Ok(Self::SeverityChanged),
            "assignee_changed" => Ok(Self::AssigneeChanged),
            "fields_changed" => Ok(Self::FieldsChanged),
            "payload_changed" => Ok(Self::PayloadChanged),
            "tag_added" => Ok(Self::TagAdded),
            "tag_removed" => Ok(Self::TagRemoved),
            "attachment_created" => Ok(Self::AttachmentCreated),
            "attachment_deleted" => Ok(Self::AttachmentDeleted),
            _ => Err(UnknownEventType(s.to_string())),
        }
    }
}

impl Serialize for CaseEventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CaseEventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event type strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}
