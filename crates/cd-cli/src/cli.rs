//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Case duration metrics.
///
/// Measures the time between two anchor events in a case's history, such as
/// "created" to "first closed", for every configured duration definition.
#[derive(Debug, Parser)]
#[command(name = "cdur", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show database location and workspace counts.
    Status,

    /// Import case events as JSONL from stdin.
    Import,

    /// Manage duration definitions.
    #[command(subcommand)]
    Definitions(DefinitionsAction),

    /// Compute every duration for a case.
    Compute {
        /// The case to compute.
        #[arg(long = "case")]
        case_id: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Persist the computed records.
        #[arg(long)]
        sync: bool,
    },

    /// Manage persisted durations.
    #[command(subcommand)]
    Durations(DurationsAction),
}

/// Definition administration.
#[derive(Debug, Subcommand)]
pub enum DefinitionsAction {
    /// List definitions in the workspace.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one definition.
    Get {
        /// Definition ID.
        id: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create a definition from a JSON file.
    Create {
        /// JSON file with `name`, `description`, `start_anchor`, `end_anchor`.
        #[arg(long)]
        file: PathBuf,
    },

    /// Apply a JSON patch file to a definition.
    Update {
        /// Definition ID.
        id: String,

        /// JSON file with the fields to change.
        #[arg(long)]
        file: PathBuf,
    },

    /// Delete a definition and its persisted durations.
    Delete {
        /// Definition ID.
        id: String,
    },
}

/// Persisted duration administration.
#[derive(Debug, Subcommand)]
pub enum DurationsAction {
    /// List persisted durations for a case.
    List {
        /// The case to list.
        #[arg(long = "case")]
        case_id: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one persisted duration.
    Get {
        #[arg(long = "case")]
        case_id: String,

        #[arg(long = "definition")]
        definition_id: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record a duration from a JSON file of boundaries.
    Create {
        #[arg(long = "case")]
        case_id: String,

        #[arg(long = "definition")]
        definition_id: String,

        /// JSON file with optional `start` and `end`, each `{event_id, at}`.
        #[arg(long)]
        file: PathBuf,
    },

    /// Apply a JSON patch file to a persisted duration.
    Update {
        #[arg(long = "case")]
        case_id: String,

        #[arg(long = "definition")]
        definition_id: String,

        /// JSON file with the boundaries to change; `null` clears one.
        #[arg(long)]
        file: PathBuf,
    },

    /// Delete a persisted duration.
    Delete {
        #[arg(long = "case")]
        case_id: String,

        #[arg(long = "definition")]
        definition_id: String,
    },
}
