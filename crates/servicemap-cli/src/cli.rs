//! Argument definitions for the `servicemap` binary.

use clap::{Args, Parser, Subcommand};

use servicemap_core::{
    EnvironmentName, Relationship, RelationshipId, RelationshipPatch, Service, ServiceStatus,
    ServiceType, ServiceUpdate,
};

#[derive(Parser)]
#[command(name = "servicemap")]
#[command(about = "Record services and their relationships per environment, and explore the graph")]
pub struct Cli {
    /// Config file prefix (default: servicemap).
    #[arg(short, long, default_value = "servicemap", global = true)]
    pub config: String,

    /// Override the data directory from config.
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Environment to operate on (default: the current environment).
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn environment(&self) -> Option<EnvironmentName> {
        self.env.as_deref().map(EnvironmentName::from)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage environments.
    #[command(subcommand)]
    Env(EnvCommand),

    /// Manage services.
    #[command(subcommand)]
    Service(ServiceCommand),

    /// Manage relationships.
    #[command(subcommand)]
    Rel(RelCommand),

    /// Show the neighborhood of a service.
    Graph {
        /// Center service id.
        center: String,

        /// Hops to follow in either direction (default: 1).
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Audit an environment for integrity issues.
    Validate {
        /// Exit non-zero if any error-severity issue is found.
        #[arg(long)]
        strict: bool,
    },

    /// Read JSON commands from stdin, one per line, and write one JSON
    /// response per line.
    Exec,
}

#[derive(Subcommand)]
pub enum EnvCommand {
    List,
    Current,
    Create { name: String },
    Switch { name: String },
}

#[derive(Subcommand)]
pub enum ServiceCommand {
    List,
    Get {
        id: String,
    },
    Search {
        query: String,
    },
    Add {
        id: String,
        name: String,
        #[command(flatten)]
        fields: ServiceFields,
    },
    /// Change the given attributes; everything else is kept.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ServiceFields,
    },
    /// Delete a service and every relationship touching it.
    Delete {
        id: String,
    },
}

#[derive(Args, Default)]
pub struct ServiceFields {
    /// Service type, e.g. api, database, cache.
    #[arg(long = "type")]
    pub service_type: Option<String>,

    /// Status, e.g. healthy, degraded.
    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub version: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub team: Option<String>,

    /// Tag to add (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

impl ServiceFields {
    /// Overlay the given fields on `service`. Tags are added, not replaced.
    pub fn apply(self, service: &mut Service) {
        if let Some(t) = self.service_type {
            service.service_type = ServiceType::new(t);
        }
        if let Some(s) = self.status {
            service.status = ServiceStatus::new(s);
        }
        if self.description.is_some() {
            service.description = self.description;
        }
        if self.version.is_some() {
            service.version = self.version;
        }
        if self.owner.is_some() {
            service.owner = self.owner;
        }
        if self.team.is_some() {
            service.team = self.team;
        }
        service.tags.extend(self.tags);
    }
}

/// Build the full update for `service` from an optional new name and fields.
pub fn service_update(mut service: Service, name: Option<String>, fields: ServiceFields) -> ServiceUpdate {
    if let Some(name) = name {
        service.name = name;
    }
    fields.apply(&mut service);
    ServiceUpdate::from(service)
}

#[derive(Subcommand)]
pub enum RelCommand {
    List {
        /// Only relationships touching this service.
        #[arg(long)]
        service: Option<String>,
    },
    Get {
        id: String,
    },
    Add {
        source: String,
        target: String,
        /// Relationship type (default: depends_on).
        #[arg(long = "type", default_value = "depends_on")]
        relationship_type: String,
        /// Relationship id (generated if omitted).
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long = "type")]
        relationship_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        id: String,
    },
}

pub fn new_relationship(
    id: Option<String>,
    source: String,
    target: String,
    relationship_type: String,
    description: Option<String>,
) -> Relationship {
    // A blank id is filled in by the command layer.
    let mut rel = Relationship::new(
        id.map(RelationshipId::from).unwrap_or_default(),
        source,
        target,
        relationship_type.as_str(),
    );
    rel.description = description;
    rel
}

pub fn relationship_patch(
    source: Option<String>,
    target: Option<String>,
    relationship_type: Option<String>,
    description: Option<String>,
) -> RelationshipPatch {
    RelationshipPatch {
        source: source.map(Into::into),
        target: target.map(Into::into),
        relationship_type: relationship_type.map(|t| t.as_str().into()),
        description,
        metadata: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_add() {
        let cli = Cli::try_parse_from([
            "servicemap", "--env", "prod", "service", "add", "user-api", "User API", "--type",
            "api", "--tag", "auth", "--tag", "core",
        ])
        .unwrap();
        assert_eq!(cli.environment(), Some(EnvironmentName::from("prod")));

        let Commands::Service(ServiceCommand::Add { id, name, fields }) = cli.command else {
            panic!("wrong subcommand");
        };
        let mut svc = Service::new(id, name);
        fields.apply(&mut svc);
        assert_eq!(svc.service_type.as_str(), "api");
        assert_eq!(svc.tags.len(), 2);
        assert_eq!(svc.status.as_str(), "unknown");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["servicemap", "graph", "api", "--depth", "2", "--env", "dev"])
            .unwrap();
        assert_eq!(cli.env.as_deref(), Some("dev"));
        assert!(matches!(cli.command, Commands::Graph { depth: Some(2), .. }));
    }

    #[test]
    fn test_service_update_keeps_unset_fields() {
        let mut svc = Service::new("db", "Postgres").with_type("database").with_tag("sql");
        svc.owner = Some("dba".to_string());
        let fields = ServiceFields {
            status: Some("degraded".to_string()),
            ..Default::default()
        };
        let update = service_update(svc, None, fields);
        assert_eq!(update.name, "Postgres");
        assert_eq!(update.service_type.as_str(), "database");
        assert_eq!(update.status.as_str(), "degraded");
        assert_eq!(update.owner.as_deref(), Some("dba"));
        assert!(update.tags.contains("sql"));
    }

    #[test]
    fn test_relationship_helpers() {
        let rel = new_relationship(None, "a".into(), "b".into(), "reads_from".into(), None);
        assert!(rel.id.is_blank());
        assert_eq!(rel.relationship_type.as_str(), "reads_from");

        let patch = relationship_patch(None, Some("c".into()), None, None);
        assert!(patch.touches_endpoints());
        assert!(patch.relationship_type.is_none());
    }
}
