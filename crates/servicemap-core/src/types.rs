//! Core domain types for the service map.
//!
//! A service is a node, a relationship is a directed typed edge between two
//! services, and both belong to exactly one environment. These types are
//! shared by the store, the persistence backends, and the analysis engine.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Identifiers ───────────────────────────────────────────────────

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when the identifier is empty or whitespace only.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Name of an isolated environment ("dev", "staging", "prod", ...).
    EnvironmentName
);

string_id!(
    /// Identifier of a service, unique within its environment.
    ServiceId
);

string_id!(
    /// Identifier of a relationship, unique within its environment.
    RelationshipId
);

impl RelationshipId {
    /// Generate a fresh identifier for callers that did not supply one.
    pub fn generate() -> Self {
        Self(format!("rel-{}", Uuid::new_v4()))
    }
}

// ── Open vocabularies ─────────────────────────────────────────────

macro_rules! open_vocabulary {
    ($(#[$meta:meta])* $name:ident, default = $default:literal, recommended = [$($value:literal),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Values offered by default in forms and accepted without warnings.
            pub const RECOMMENDED: &'static [&'static str] = &[$($value),+];

            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_recommended(&self) -> bool {
                Self::RECOMMENDED.contains(&self.0.as_str())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self($default.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

open_vocabulary!(
    /// Category of a service. Any string is accepted.
    ServiceType,
    default = "backend",
    recommended = [
        "api",
        "database",
        "cache",
        "queue",
        "gateway",
        "frontend",
        "backend",
        "external",
        "identity-provider",
    ]
);

open_vocabulary!(
    /// Operational status of a service. Any string is accepted.
    ServiceStatus,
    default = "unknown",
    recommended = ["healthy", "degraded", "unhealthy", "unknown", "deprecated"]
);

open_vocabulary!(
    /// What the source of a relationship does to its target. Any string is accepted.
    RelationshipType,
    default = "depends_on",
    recommended = [
        "depends_on",
        "communicates_with",
        "authenticates_via",
        "reads_from",
        "writes_to",
        "publishes",
        "subscribes",
    ]
);

// ── Entities ──────────────────────────────────────────────────────

/// A deployable component in an environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub id: ServiceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_type: ServiceType,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Service {
    /// A service with default type and status and no optional attributes.
    pub fn new(id: impl Into<ServiceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            service_type: ServiceType::default(),
            status: ServiceStatus::default(),
            description: None,
            version: None,
            owner: None,
            team: None,
            tags: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, service_type: impl Into<ServiceType>) -> Self {
        self.service_type = service_type.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<ServiceStatus>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Names of mandatory attributes that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.is_blank() {
            missing.push("id");
        }
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        missing
    }

    /// Case-insensitive substring match over id, name, description, owner,
    /// team, and tags.
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        let hit = |s: &str| s.to_lowercase().contains(&needle);

        hit(&self.name)
            || hit(self.id.as_str())
            || self.description.as_deref().is_some_and(hit)
            || self.owner.as_deref().is_some_and(hit)
            || self.team.as_deref().is_some_and(hit)
            || self.tags.iter().any(|t| hit(t.as_str()))
    }

    /// Replace every mutable attribute, keeping the id.
    pub fn apply_update(&mut self, update: ServiceUpdate) {
        self.name = update.name;
        self.service_type = update.service_type;
        self.status = update.status;
        self.description = update.description;
        self.version = update.version;
        self.owner = update.owner;
        self.team = update.team;
        self.tags = update.tags;
        self.metadata = update.metadata;
    }
}

/// Full replacement of a service's mutable attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUpdate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_type: ServiceType,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl From<Service> for ServiceUpdate {
    fn from(s: Service) -> Self {
        Self {
            name: s.name,
            service_type: s.service_type,
            status: s.status,
            description: s.description,
            version: s.version,
            owner: s.owner,
            team: s.team,
            tags: s.tags,
            metadata: s.metadata,
        }
    }
}

/// A directed, typed edge: `source` does `relationship_type` to `target`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[serde(default)]
    pub id: RelationshipId,
    #[serde(default)]
    pub source: ServiceId,
    #[serde(default)]
    pub target: ServiceId,
    #[serde(default)]
    pub relationship_type: RelationshipType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl Relationship {
    pub fn new(
        id: impl Into<RelationshipId>,
        source: impl Into<ServiceId>,
        target: impl Into<ServiceId>,
        relationship_type: impl Into<RelationshipType>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            relationship_type: relationship_type.into(),
            description: None,
            metadata: None,
        }
    }

    /// Names of mandatory attributes that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.is_blank() {
            missing.push("id");
        }
        if self.source.is_blank() {
            missing.push("source");
        }
        if self.target.is_blank() {
            missing.push("target");
        }
        missing
    }

    /// True if `service` is either endpoint.
    pub fn touches(&self, service: &str) -> bool {
        self.source.as_str() == service || self.target.as_str() == service
    }

    /// The uniqueness key of this edge within an environment.
    pub fn edge_key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            relationship_type: self.relationship_type.clone(),
        }
    }
}

/// `(source, target, relationship_type)`: at most one relationship per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: ServiceId,
    pub target: ServiceId,
    pub relationship_type: RelationshipType,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.relationship_type, self.target)
    }
}

/// Partial update of a relationship. `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipPatch {
    #[serde(default)]
    pub source: Option<ServiceId>,
    #[serde(default)]
    pub target: Option<ServiceId>,
    #[serde(default)]
    pub relationship_type: Option<RelationshipType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl RelationshipPatch {
    /// True if applying the patch may move either endpoint.
    pub fn touches_endpoints(&self) -> bool {
        self.source.is_some() || self.target.is_some()
    }

    /// Produce the patched copy of `rel`.
    pub fn applied_to(&self, rel: &Relationship) -> Relationship {
        let mut out = rel.clone();
        if let Some(source) = &self.source {
            out.source = source.clone();
        }
        if let Some(target) = &self.target {
            out.target = target.clone();
        }
        if let Some(rt) = &self.relationship_type {
            out.relationship_type = rt.clone();
        }
        if let Some(description) = &self.description {
            out.description = Some(description.clone());
        }
        if let Some(metadata) = &self.metadata {
            out.metadata = Some(metadata.clone());
        }
        out
    }
}

/// The full contents of one environment as exchanged with persistence and
/// the validation engine. Being plain lists, it can carry data that violates
/// store invariants (duplicates, dangling edges) when imported from outside.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentData {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl EnvironmentData {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.relationships.is_empty()
    }
}

/// Rank used to list environments in promotion order.
pub fn environment_rank(name: &str) -> u8 {
    match name {
        "dev" | "development" => 0,
        "staging" | "stage" => 1,
        "prod" | "production" => 2,
        _ => 3,
    }
}

/// Sort environment names dev → staging → prod, then alphabetically.
pub fn sort_environments(names: &mut [EnvironmentName]) {
    names.sort_by(|a, b| {
        environment_rank(a.as_str())
            .cmp(&environment_rank(b.as_str()))
            .then_with(|| a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_serializes_camel_case() {
        let svc = Service::new("user-api", "User API").with_type("api");
        let json = serde_json::to_value(&svc).unwrap();
        assert_eq!(json["serviceType"], "api");
        assert_eq!(json["status"], "unknown");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn service_defaults_on_deserialize() {
        let svc: Service = serde_json::from_str(r#"{"id": "db", "name": "Postgres"}"#).unwrap();
        assert_eq!(svc.service_type.as_str(), "backend");
        assert_eq!(svc.status.as_str(), "unknown");
        assert!(svc.tags.is_empty());
    }

    #[test]
    fn open_vocabulary_accepts_custom_values() {
        let svc: Service = serde_json::from_str(
            r#"{"id": "ml", "name": "Model server", "serviceType": "ml-inference", "status": "warming"}"#,
        )
        .unwrap();
        assert_eq!(svc.service_type.as_str(), "ml-inference");
        assert!(!svc.service_type.is_recommended());
        assert!(!svc.status.is_recommended());
        assert!(ServiceType::from("identity-provider").is_recommended());
    }

    #[test]
    fn relationship_type_defaults_to_depends_on() {
        let rel: Relationship =
            serde_json::from_str(r#"{"id": "r1", "source": "a", "target": "b"}"#).unwrap();
        assert_eq!(rel.relationship_type.as_str(), "depends_on");
        assert!(rel.relationship_type.is_recommended());
    }

    #[test]
    fn missing_fields_reports_blank_values() {
        let svc = Service::new(" ", "");
        assert_eq!(svc.missing_fields(), vec!["id", "name"]);

        let rel = Relationship::new("r1", "", "b", "depends_on");
        assert_eq!(rel.missing_fields(), vec!["source"]);
    }

    #[test]
    fn matches_search_is_case_insensitive() {
        let mut svc = Service::new("user-api", "User API Service").with_tag("auth");
        svc.team = Some("Identity".to_string());

        assert!(svc.matches_search("user"));
        assert!(svc.matches_search("AUTH"));
        assert!(svc.matches_search("identity"));
        assert!(!svc.matches_search("orders"));
    }

    #[test]
    fn apply_update_keeps_id() {
        let mut svc = Service::new("cache", "Cache");
        let update = ServiceUpdate {
            name: "Redis".to_string(),
            service_type: ServiceType::from("cache"),
            status: ServiceStatus::from("healthy"),
            ..Default::default()
        };
        svc.apply_update(update);
        assert_eq!(svc.id.as_str(), "cache");
        assert_eq!(svc.name, "Redis");
        assert_eq!(svc.status.as_str(), "healthy");
    }

    #[test]
    fn patch_only_changes_given_fields() {
        let rel = Relationship::new("r1", "a", "b", "depends_on");
        let patch = RelationshipPatch {
            target: Some(ServiceId::from("c")),
            ..Default::default()
        };
        assert!(patch.touches_endpoints());
        let patched = patch.applied_to(&rel);
        assert_eq!(patched.source.as_str(), "a");
        assert_eq!(patched.target.as_str(), "c");
        assert_eq!(patched.relationship_type.as_str(), "depends_on");
    }

    #[test]
    fn generated_relationship_ids_are_unique() {
        let a = RelationshipId::generate();
        let b = RelationshipId::generate();
        assert!(a.as_str().starts_with("rel-"));
        assert_ne!(a, b);
    }

    #[test]
    fn environments_sort_in_promotion_order() {
        let mut names: Vec<EnvironmentName> = ["qa", "prod", "dev", "staging", "alpha"]
            .into_iter()
            .map(EnvironmentName::from)
            .collect();
        sort_environments(&mut names);
        let ordered: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
        assert_eq!(ordered, vec!["dev", "staging", "prod", "alpha", "qa"]);
    }
}
