//! Result types for traversal and validation.

use serde::{Deserialize, Serialize};

use servicemap_core::{Relationship, Service};

/// The induced subgraph within N hops of a center service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Neighborhood {
    pub center: Service,
    /// Every other service within range, ordered by id.
    pub connected: Vec<Service>,
    /// Relationships with both endpoints in `{center} ∪ connected`, ordered by id.
    pub relationships: Vec<Relationship>,
}

impl Neighborhood {
    pub fn contains(&self, service: &str) -> bool {
        self.center.id.as_str() == service || self.connected.iter().any(|s| s.id.as_str() == service)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateServiceId,
    DuplicateRelationshipId,
    DuplicateEdge,
    SelfLoop,
    OrphanedRelationship,
    MissingRequiredField,
    InvalidRelationshipType,
    CircularDependency,
    UnreachableService,
}

impl IssueKind {
    pub fn severity(self) -> IssueSeverity {
        match self {
            IssueKind::InvalidRelationshipType | IssueKind::CircularDependency => {
                IssueSeverity::Warning
            }
            IssueKind::UnreachableService => IssueSeverity::Info,
            _ => IssueSeverity::Error,
        }
    }
}

/// One integrity finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub kind: IssueKind,
    pub message: String,
    pub affected_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>, affected_ids: Vec<String>) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            message: message.into(),
            affected_ids,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Issues ordered errors → warnings → info, discovery order within each.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

impl ValidationReport {
    pub fn from_issues(mut issues: Vec<ValidationIssue>) -> Self {
        // Stable: keeps discovery order within a severity.
        issues.sort_by_key(|i| i.severity);
        let count = |s: IssueSeverity| issues.iter().filter(|i| i.severity == s).count();
        Self {
            error_count: count(IssueSeverity::Error),
            warning_count: count(IssueSeverity::Warning),
            info_count: count(IssueSeverity::Info),
            issues,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}
