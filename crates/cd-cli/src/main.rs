use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cd_cli::commands::{compute, definitions, durations, import, status};
use cd_cli::{Cli, Commands, Config, DefinitionsAction, DurationsAction};
use cd_core::{CaseId, DefinitionId, WorkspaceId};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(cd_db::Database, Config, WorkspaceId)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let workspace = WorkspaceId::new(config.workspace.clone()).context("invalid workspace")?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = cd_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config, workspace))
}

fn record_key(case_id: &str, definition_id: &str) -> Result<(CaseId, DefinitionId)> {
    Ok((
        CaseId::new(case_id.to_string())?,
        DefinitionId::new(definition_id.to_string())?,
    ))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();

    match &cli.command {
        Some(Commands::Status) => {
            let (db, config, workspace) = open_database(cli.config.as_deref())?;
            status::run(&mut stdout, &db, &config.database_path, &workspace)?;
        }
        Some(Commands::Import) => {
            let (mut db, _config, workspace) = open_database(cli.config.as_deref())?;
            let inserted = import::run(io::stdin().lock(), &mut db, &workspace)?;
            eprintln!("Imported {inserted} events");
        }
        Some(Commands::Definitions(action)) => {
            let (mut db, _config, workspace) = open_database(cli.config.as_deref())?;
            match action {
                DefinitionsAction::List { json } => {
                    definitions::list(&mut stdout, &db, &workspace, *json)?;
                }
                DefinitionsAction::Get { id, json } => {
                    let id = DefinitionId::new(id.clone())?;
                    definitions::get(&mut stdout, &db, &workspace, &id, *json)?;
                }
                DefinitionsAction::Create { file } => {
                    definitions::create(&mut stdout, &mut db, &workspace, file)?;
                }
                DefinitionsAction::Update { id, file } => {
                    let id = DefinitionId::new(id.clone())?;
                    definitions::update(&mut stdout, &mut db, &workspace, &id, file)?;
                }
                DefinitionsAction::Delete { id } => {
                    let id = DefinitionId::new(id.clone())?;
                    definitions::delete(&mut stdout, &mut db, &workspace, &id)?;
                }
            }
        }
        Some(Commands::Compute {
            case_id,
            json,
            sync,
        }) => {
            let (mut db, _config, _workspace) = open_database(cli.config.as_deref())?;
            let case_id = CaseId::new(case_id.clone())?;
            compute::run(&mut stdout, &mut db, &case_id, *json, *sync)?;
        }
        Some(Commands::Durations(action)) => {
            let (mut db, _config, _workspace) = open_database(cli.config.as_deref())?;
            match action {
                DurationsAction::List { case_id, json } => {
                    let case_id = CaseId::new(case_id.clone())?;
                    durations::list(&mut stdout, &db, &case_id, *json)?;
                }
                DurationsAction::Get {
                    case_id,
                    definition_id,
                    json,
                } => {
                    let (case_id, definition_id) = record_key(case_id, definition_id)?;
                    durations::get(&mut stdout, &db, &case_id, &definition_id, *json)?;
                }
                DurationsAction::Create {
                    case_id,
                    definition_id,
                    file,
                } => {
                    let (case_id, definition_id) = record_key(case_id, definition_id)?;
                    durations::create(&mut stdout, &mut db, &case_id, &definition_id, file)?;
                }
                DurationsAction::Update {
                    case_id,
                    definition_id,
                    file,
                } => {
                    let (case_id, definition_id) = record_key(case_id, definition_id)?;
                    durations::update(&mut stdout, &mut db, &case_id, &definition_id, file)?;
                }
                DurationsAction::Delete {
                    case_id,
                    definition_id,
                } => {
                    let (case_id, definition_id) = record_key(case_id, definition_id)?;
                    durations::delete(&mut stdout, &mut db, &case_id, &definition_id)?;
                }
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
