//! JSON command surface over the store and the analysis engine.
//!
//! A host application sends one [`Command`] per call, tagged by name:
//! ```json
//! {"command": "create_relationship", "environment": "dev",
//!  "relationship": {"id": "r1", "source": "api", "target": "db"}}
//! ```
//! Commands that take an environment fall back to the current one when it is
//! omitted. Failures carry a discriminated `kind` for control flow and a
//! message for humans.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use servicemap_core::{
    EnvironmentName, ErrorKind, Relationship, RelationshipId, RelationshipPatch, Service,
    ServiceId, ServiceUpdate,
};

use crate::error::{AnalyzeError, Result};
use crate::AnalysisEngine;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Command {
    // ── Environments ─────────────────────────────────────────────
    ListEnvironments,
    GetCurrentEnvironment,
    CreateEnvironment {
        name: EnvironmentName,
    },
    SwitchEnvironment {
        name: EnvironmentName,
    },

    // ── Services ─────────────────────────────────────────────────
    ListServices {
        #[serde(default)]
        environment: Option<EnvironmentName>,
    },
    GetService {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        id: ServiceId,
    },
    SearchServices {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        query: String,
    },
    CreateService {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        service: Service,
    },
    UpdateService {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        id: ServiceId,
        update: ServiceUpdate,
    },
    /// Always cascades: relationships touching the service go with it.
    DeleteService {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        id: ServiceId,
    },

    // ── Relationships ────────────────────────────────────────────
    ListRelationships {
        #[serde(default)]
        environment: Option<EnvironmentName>,
    },
    GetRelationship {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        id: RelationshipId,
    },
    RelationshipsForService {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        service_id: ServiceId,
    },
    /// A blank relationship id is replaced with a generated one.
    CreateRelationship {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        relationship: Relationship,
    },
    UpdateRelationship {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        id: RelationshipId,
        patch: RelationshipPatch,
    },
    DeleteRelationship {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        id: RelationshipId,
    },

    // ── Analysis ─────────────────────────────────────────────────
    GetNeighborhood {
        #[serde(default)]
        environment: Option<EnvironmentName>,
        center: ServiceId,
        #[serde(default)]
        depth: Option<usize>,
    },
    Validate {
        #[serde(default)]
        environment: Option<EnvironmentName>,
    },
}

/// Error payload returned to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AnalyzeError> for CommandError {
    fn from(e: &AnalyzeError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Outcome of one command as sent back over the boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Ok { data: Value },
    Error { error: CommandError },
}

impl Response {
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ListEnvironments => "list_environments",
            Command::GetCurrentEnvironment => "get_current_environment",
            Command::CreateEnvironment { .. } => "create_environment",
            Command::SwitchEnvironment { .. } => "switch_environment",
            Command::ListServices { .. } => "list_services",
            Command::GetService { .. } => "get_service",
            Command::SearchServices { .. } => "search_services",
            Command::CreateService { .. } => "create_service",
            Command::UpdateService { .. } => "update_service",
            Command::DeleteService { .. } => "delete_service",
            Command::ListRelationships { .. } => "list_relationships",
            Command::GetRelationship { .. } => "get_relationship",
            Command::RelationshipsForService { .. } => "relationships_for_service",
            Command::CreateRelationship { .. } => "create_relationship",
            Command::UpdateRelationship { .. } => "update_relationship",
            Command::DeleteRelationship { .. } => "delete_relationship",
            Command::GetNeighborhood { .. } => "get_neighborhood",
            Command::Validate { .. } => "validate",
        }
    }
}

/// Run one command, returning its JSON result.
pub fn execute(engine: &AnalysisEngine, command: Command) -> Result<Value> {
    let store = engine.store();
    let name = command.name();
    tracing::debug!(command = name, "Executing command");

    let value = match command {
        Command::ListEnvironments => serde_json::to_value(store.list_environments()?)?,
        Command::GetCurrentEnvironment => serde_json::to_value(store.current_environment()?)?,
        Command::CreateEnvironment { name } => {
            store.create_environment(&name)?;
            json!({ "name": name })
        }
        Command::SwitchEnvironment { name } => {
            store.switch_environment(&name)?;
            json!({ "current": name })
        }

        Command::ListServices { environment } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.list_services(&env)?)?
        }
        Command::GetService { environment, id } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.get_service(&env, id.as_str())?)?
        }
        Command::SearchServices { environment, query } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.search_services(&env, &query)?)?
        }
        Command::CreateService {
            environment,
            service,
        } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.create_service(&env, service)?)?
        }
        Command::UpdateService {
            environment,
            id,
            update,
        } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.update_service(&env, id.as_str(), update)?)?
        }
        Command::DeleteService { environment, id } => {
            let env = resolve(engine, environment)?;
            let removed = store.delete_service_cascade(&env, id.as_str())?;
            json!({ "id": id, "relationshipsRemoved": removed })
        }

        Command::ListRelationships { environment } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.list_relationships(&env)?)?
        }
        Command::GetRelationship { environment, id } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.get_relationship(&env, id.as_str())?)?
        }
        Command::RelationshipsForService {
            environment,
            service_id,
        } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.relationships_for_service(&env, service_id.as_str())?)?
        }
        Command::CreateRelationship {
            environment,
            mut relationship,
        } => {
            let env = resolve(engine, environment)?;
            if relationship.id.is_blank() {
                relationship.id = RelationshipId::generate();
            }
            serde_json::to_value(store.create_relationship(&env, relationship)?)?
        }
        Command::UpdateRelationship {
            environment,
            id,
            patch,
        } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.update_relationship(&env, id.as_str(), patch)?)?
        }
        Command::DeleteRelationship { environment, id } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(store.delete_relationship(&env, id.as_str())?)?
        }

        Command::GetNeighborhood {
            environment,
            center,
            depth,
        } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(engine.neighborhood(&env, center.as_str(), depth)?)?
        }
        Command::Validate { environment } => {
            let env = resolve(engine, environment)?;
            serde_json::to_value(engine.validate(&env)?)?
        }
    };

    Ok(value)
}

/// Run one command and wrap the outcome for the host. Never fails.
pub fn respond(engine: &AnalysisEngine, command: Command) -> Response {
    let name = command.name();
    match execute(engine, command) {
        Ok(data) => Response::Ok { data },
        Err(e) => {
            if e.kind().is_recoverable() {
                tracing::debug!(command = name, kind = %e.kind(), error = %e, "Command rejected");
            } else {
                tracing::error!(command = name, kind = %e.kind(), error = %e, "Command failed");
            }
            Response::Error {
                error: CommandError::from(&e),
            }
        }
    }
}

/// Parse a JSON command and run it. Malformed input becomes an
/// `invalid_input` error response.
pub fn respond_json(engine: &AnalysisEngine, input: &str) -> Response {
    match serde_json::from_str::<Command>(input) {
        Ok(command) => respond(engine, command),
        Err(e) => Response::Error {
            error: CommandError::from(&AnalyzeError::InvalidCommand(e.to_string())),
        },
    }
}

fn resolve(engine: &AnalysisEngine, environment: Option<EnvironmentName>) -> Result<EnvironmentName> {
    match environment {
        Some(env) => Ok(env),
        None => engine
            .store()
            .current_environment()?
            .ok_or(AnalyzeError::NoCurrentEnvironment),
    }
}
