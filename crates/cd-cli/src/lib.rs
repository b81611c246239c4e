//! Case duration CLI library.
//!
//! This crate provides the CLI interface for computing case durations.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, DefinitionsAction, DurationsAction};
pub use config::Config;
