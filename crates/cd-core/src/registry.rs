//! In-memory registry of duration definitions per workspace.

use std::collections::HashMap;
use std::convert::Infallible;

use thiserror::Error;

use crate::definition::{DefinitionDraft, DefinitionPatch, DurationDefinition};
use crate::source::DefinitionSource;
use crate::types::{DefinitionId, ValidationError, WorkspaceId};

/// Errors from registry administration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No definition with this ID exists in the workspace.
    #[error("duration definition {0} not found")]
    NotFound(DefinitionId),
    /// Another definition in the workspace already uses this name.
    #[error("a duration named '{0}' already exists")]
    DuplicateName(String),
    /// The definition failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Definitions grouped by workspace, kept in creation order.
#[derive(Debug, Default, Clone)]
pub struct DefinitionRegistry {
    workspaces: HashMap<WorkspaceId, Vec<DurationDefinition>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a new definition under a fresh ID.
    pub fn create(
        &mut self,
        workspace: &WorkspaceId,
        draft: DefinitionDraft,
    ) -> Result<DurationDefinition, RegistryError> {
        let definition = DurationDefinition::from_draft(DefinitionId::generate(), draft)?;
        let definitions = self.workspaces.entry(workspace.clone()).or_default();
        ensure_unique_name(definitions, &definition.name, None)?;
        definitions.push(definition.clone());
        tracing::debug!(workspace = %workspace, definition_id = %definition.id, "created duration definition");
        Ok(definition)
    }

    pub fn get(
        &self,
        workspace: &WorkspaceId,
        id: &DefinitionId,
    ) -> Result<&DurationDefinition, RegistryError> {
        self.workspaces
            .get(workspace)
            .and_then(|defs| defs.iter().find(|d| &d.id == id))
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Applies a patch, keeping names unique within the workspace.
    pub fn update(
        &mut self,
        workspace: &WorkspaceId,
        id: &DefinitionId,
        patch: DefinitionPatch,
    ) -> Result<DurationDefinition, RegistryError> {
        let definitions = self
            .workspaces
            .get_mut(workspace)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        let index = definitions
            .iter()
            .position(|d| &d.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        if patch.is_empty() {
            return Ok(definitions[index].clone());
        }
        let updated = definitions[index].patched(patch)?;
        ensure_unique_name(definitions, &updated.name, Some(id))?;
        definitions[index] = updated.clone();
        Ok(updated)
    }

    pub fn delete(&mut self, workspace: &WorkspaceId, id: &DefinitionId) -> Result<(), RegistryError> {
        let definitions = self
            .workspaces
            .get_mut(workspace)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        let before = definitions.len();
        definitions.retain(|d| &d.id != id);
        if definitions.len() == before {
            return Err(RegistryError::NotFound(id.clone()));
        }
        Ok(())
    }

    /// Returns the workspace's definitions in creation order.
    pub fn list_active(&self, workspace: &WorkspaceId) -> &[DurationDefinition] {
        self.workspaces
            .get(workspace)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl DefinitionSource for DefinitionRegistry {
    type Error = Infallible;

    fn list_active(&self, workspace: &WorkspaceId) -> Result<Vec<DurationDefinition>, Self::Error> {
        Ok(Self::list_active(self, workspace).to_vec())
    }
}

fn ensure_unique_name(
    definitions: &[DurationDefinition],
    name: &str,
    exclude: Option<&DefinitionId>,
) -> Result<(), RegistryError> {
    let taken = definitions
        .iter()
        .any(|d| d.name == name && Some(&d.id) != exclude);
    if taken {
        return Err(RegistryError::DuplicateName(name.to_string()));
    }
    Ok(())
}
