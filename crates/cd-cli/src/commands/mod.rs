//! CLI subcommand implementations.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

pub mod compute;
pub mod definitions;
pub mod durations;
pub mod import;
pub mod status;

/// Reads and deserializes a JSON input file.
pub(crate) fn read_json<T: DeserializeOwned>(file: &Path) -> Result<T> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", file.display()))
}
