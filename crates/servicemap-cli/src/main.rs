//! CLI entry point for servicemap.

mod cli;

use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use servicemap_analyze::commands::{self, respond_json, Command};
use servicemap_analyze::{AnalysisEngine, ValidationReport};
use servicemap_core::{EnvironmentName, Service};
use servicemap_graph::GraphStore;
use servicemap_storage::JsonDirStore;

use crate::cli::{Cli, Commands, EnvCommand, RelCommand, ServiceCommand};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.json_logs {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let engine = open_engine(&cli)?;

    if let Commands::Exec = cli.command {
        return exec_stdin(&engine);
    }

    let strict = matches!(cli.command, Commands::Validate { strict: true });
    let output = run(&engine, cli.environment(), cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if strict {
        let report: ValidationReport = serde_json::from_value(output)?;
        if report.has_errors() {
            anyhow::bail!("validation found {} error(s)", report.error_count);
        }
    }
    Ok(())
}

fn open_engine(cli: &Cli) -> anyhow::Result<AnalysisEngine> {
    let mut config = servicemap_core::config::load(&cli.config)?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }

    let backend = JsonDirStore::new(&config.storage.data_dir, config.storage.checksum_policy)?;
    let store = GraphStore::open(config.store, Arc::new(backend))?;

    for (env, violations) in store.quarantined_environments()? {
        tracing::warn!(
            environment = %env,
            violations = violations.len(),
            "Environment is read-only until repaired; run `servicemap validate` for details"
        );
    }

    Ok(AnalysisEngine::new(Arc::new(store)).with_validation_config(config.validation))
}

/// Translate one subcommand into store commands and run them.
fn run(
    engine: &AnalysisEngine,
    environment: Option<EnvironmentName>,
    command: Commands,
) -> anyhow::Result<Value> {
    let env = environment;
    let cmd = match command {
        Commands::Env(sub) => match sub {
            EnvCommand::List => Command::ListEnvironments,
            EnvCommand::Current => Command::GetCurrentEnvironment,
            EnvCommand::Create { name } => Command::CreateEnvironment { name: name.into() },
            EnvCommand::Switch { name } => Command::SwitchEnvironment { name: name.into() },
        },

        Commands::Service(sub) => match sub {
            ServiceCommand::List => Command::ListServices { environment: env },
            ServiceCommand::Get { id } => Command::GetService {
                environment: env,
                id: id.into(),
            },
            ServiceCommand::Search { query } => Command::SearchServices {
                environment: env,
                query,
            },
            ServiceCommand::Add { id, name, fields } => {
                let mut service = Service::new(id, name);
                fields.apply(&mut service);
                Command::CreateService {
                    environment: env,
                    service,
                }
            }
            ServiceCommand::Update { id, name, fields } => {
                let current = execute(
                    engine,
                    Command::GetService {
                        environment: env.clone(),
                        id: id.as_str().into(),
                    },
                )?;
                let current: Service = serde_json::from_value(current)?;
                Command::UpdateService {
                    environment: env,
                    id: id.into(),
                    update: cli::service_update(current, name, fields),
                }
            }
            ServiceCommand::Delete { id } => Command::DeleteService {
                environment: env,
                id: id.into(),
            },
        },

        Commands::Rel(sub) => match sub {
            RelCommand::List { service: None } => Command::ListRelationships { environment: env },
            RelCommand::List {
                service: Some(service),
            } => Command::RelationshipsForService {
                environment: env,
                service_id: service.into(),
            },
            RelCommand::Get { id } => Command::GetRelationship {
                environment: env,
                id: id.into(),
            },
            RelCommand::Add {
                source,
                target,
                relationship_type,
                id,
                description,
            } => Command::CreateRelationship {
                environment: env,
                relationship: cli::new_relationship(
                    id,
                    source,
                    target,
                    relationship_type,
                    description,
                ),
            },
            RelCommand::Update {
                id,
                source,
                target,
                relationship_type,
                description,
            } => Command::UpdateRelationship {
                environment: env,
                id: id.into(),
                patch: cli::relationship_patch(source, target, relationship_type, description),
            },
            RelCommand::Delete { id } => Command::DeleteRelationship {
                environment: env,
                id: id.into(),
            },
        },

        Commands::Graph { center, depth } => Command::GetNeighborhood {
            environment: env,
            center: center.into(),
            depth,
        },
        Commands::Validate { .. } => Command::Validate { environment: env },
        Commands::Exec => anyhow::bail!("exec reads commands from stdin"),
    };

    execute(engine, cmd)
}

fn execute(engine: &AnalysisEngine, command: Command) -> anyhow::Result<Value> {
    commands::execute(engine, command).map_err(|e| anyhow::anyhow!("[{}] {e}", e.kind()))
}

/// Line-delimited JSON loop: one command in, one response out.
fn exec_stdin(engine: &AnalysisEngine) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = respond_json(engine, &line);
        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }
    Ok(())
}
