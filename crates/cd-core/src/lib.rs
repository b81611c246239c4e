//! Core domain logic for case duration metrics.
//!
//! This crate contains the fundamental types and logic for:
//! - Path resolution: walking dot-delimited paths through event payloads
//! - Anchor matching: selecting the event that marks a duration boundary
//! - Duration resolution: turning two anchors and a history into a record
//! - Definition registry: per-workspace definitions and batch computation

pub mod anchor;
pub mod definition;
pub mod event;
pub mod event_type;
mod matcher;
pub mod path;
pub mod record;
pub mod registry;
mod resolver;
pub mod source;
pub mod types;

pub use anchor::{AnchorSelection, EventAnchor};
pub use definition::{DefinitionDraft, DefinitionPatch, DurationDefinition};
pub use event::{AnchorEvent, CaseEvent};
pub use event_type::{CaseEventType, UnknownEventType};
pub use matcher::{AnchorMatch, match_anchor};
pub use record::{Boundary, BoundsPatch, DurationRecord, DurationStatus, RecordBounds};
pub use registry::{DefinitionRegistry, RegistryError};
pub use resolver::{ComputeError, compute, compute_all, ensure_ordered};
pub use source::{DefinitionSource, DurationSink, EventSource};
pub use types::{CaseId, DefinitionId, EventId, ValidationError, WorkspaceId};
