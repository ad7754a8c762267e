//! End-to-end tests for traversal and validation against a live graph store.

use std::sync::Arc;

use servicemap_analyze::{AnalysisEngine, IssueKind, IssueSeverity};
use servicemap_core::config::{StoreConfig, ValidationConfig};
use servicemap_core::{EnvironmentData, EnvironmentName, ErrorKind, Relationship, Service};
use servicemap_graph::GraphStore;
use servicemap_storage::{EnvironmentStore, MemoryStore};

fn dev() -> EnvironmentName {
    EnvironmentName::from("dev")
}

fn engine_with(services: &[&str], edges: &[(&str, &str, &str, &str)]) -> AnalysisEngine {
    let store = GraphStore::new(StoreConfig::default());
    store.create_environment(&dev()).unwrap();
    for id in services {
        store.create_service(&dev(), Service::new(*id, *id)).unwrap();
    }
    for (id, source, target, ty) in edges {
        store
            .create_relationship(&dev(), Relationship::new(*id, *source, *target, *ty))
            .unwrap();
    }
    AnalysisEngine::new(Arc::new(store))
}

/// A → B → C → D, all depends_on.
fn chain() -> AnalysisEngine {
    engine_with(
        &["A", "B", "C", "D"],
        &[
            ("ab", "A", "B", "depends_on"),
            ("bc", "B", "C", "depends_on"),
            ("cd", "C", "D", "depends_on"),
        ],
    )
}

fn connected_ids(engine: &AnalysisEngine, center: &str, depth: Option<usize>) -> (Vec<String>, Vec<String>) {
    let n = engine.neighborhood(&dev(), center, depth).unwrap();
    (
        n.connected.into_iter().map(|s| s.id.0).collect(),
        n.relationships.into_iter().map(|r| r.id.0).collect(),
    )
}

// ── Neighborhood ─────────────────────────────────────────────────

#[test]
fn test_neighborhood_depth_one() {
    let (connected, rels) = connected_ids(&chain(), "A", Some(1));
    assert_eq!(connected, vec!["B"]);
    assert_eq!(rels, vec!["ab"]);
}

#[test]
fn test_neighborhood_depth_two() {
    let (connected, rels) = connected_ids(&chain(), "A", Some(2));
    assert_eq!(connected, vec!["B", "C"]);
    assert_eq!(rels, vec!["ab", "bc"]);
}

#[test]
fn test_neighborhood_default_depth_is_one() {
    let (connected, _) = connected_ids(&chain(), "C", None);
    assert_eq!(connected, vec!["B", "D"]);
}

#[test]
fn test_neighborhood_depth_zero() {
    let (connected, rels) = connected_ids(&chain(), "B", Some(0));
    assert!(connected.is_empty());
    assert!(rels.is_empty());
}

#[test]
fn test_neighborhood_unknown_center() {
    let err = chain().neighborhood(&dev(), "ghost", Some(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = chain()
        .neighborhood(&EnvironmentName::from("prod"), "A", Some(1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ── Validation ───────────────────────────────────────────────────

#[test]
fn test_cycle_detection_example() {
    let engine = engine_with(
        &["X", "Y", "Z"],
        &[
            ("xy", "X", "Y", "depends_on"),
            ("yz", "Y", "Z", "depends_on"),
            ("zx", "Z", "X", "depends_on"),
        ],
    );
    let report = engine.validate(&dev()).unwrap();

    let cycles: Vec<_> = report.of_kind(IssueKind::CircularDependency).collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].severity, IssueSeverity::Warning);
    assert_eq!(cycles[0].affected_ids, vec!["X", "Y", "Z"]);
    assert_eq!(
        cycles[0].message,
        "Circular dependency detected: X -> Y -> Z -> X"
    );
}

#[test]
fn test_dependency_types_parameter() {
    let engine = engine_with(
        &["X", "Y"],
        &[
            ("xy", "X", "Y", "depends_on"),
            ("yx", "Y", "X", "authenticates_via"),
        ],
    );
    let report = engine.validate(&dev()).unwrap();
    assert_eq!(report.of_kind(IssueKind::CircularDependency).count(), 0);

    let engine = engine.with_validation_config(ValidationConfig {
        dependency_types: vec!["depends_on".into(), "authenticates_via".into()],
        ..ValidationConfig::default()
    });
    let report = engine.validate(&dev()).unwrap();
    assert_eq!(report.of_kind(IssueKind::CircularDependency).count(), 1);
}

#[test]
fn test_orphan_in_loaded_data_is_reported_not_repaired() {
    let backend = Arc::new(MemoryStore::new());
    let data = EnvironmentData {
        services: vec![Service::new("api", "API"), Service::new("db", "DB")],
        relationships: vec![
            Relationship::new("r1", "api", "db", "depends_on"),
            Relationship::new("r2", "api", "ghost", "depends_on"),
        ],
    };
    backend.insert_raw("dev", data.clone());

    let store = GraphStore::open(StoreConfig::default(), backend.clone()).unwrap();
    let engine = AnalysisEngine::new(Arc::new(store));

    let report = engine.validate(&dev()).unwrap();
    let orphans: Vec<_> = report.of_kind(IssueKind::OrphanedRelationship).collect();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].severity, IssueSeverity::Error);
    assert_eq!(orphans[0].affected_ids, vec!["r2", "ghost"]);
    assert!(report.has_errors());

    // Validation never mutates.
    assert_eq!(backend.load_environment(&dev()).unwrap(), data);
    assert_eq!(backend.save_count(), 0);
}

#[test]
fn test_validation_of_healthy_store_after_cascade() {
    let engine = chain();
    engine.store().delete_service_cascade(&dev(), "B").unwrap();
    let report = engine.validate(&dev()).unwrap();

    assert!(!report.has_errors());
    let islands: Vec<&str> = report
        .of_kind(IssueKind::UnreachableService)
        .map(|i| i.affected_ids[0].as_str())
        .collect();
    assert_eq!(islands, vec!["A"]);
}

#[test]
fn test_validate_concurrently_with_writes() {
    let engine = chain();
    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..50 {
                let id = format!("svc-{i}");
                engine
                    .store()
                    .create_service(&dev(), Service::new(id.as_str(), id.as_str()))
                    .unwrap();
                engine
                    .store()
                    .create_relationship(
                        &dev(),
                        Relationship::new(format!("link-{i}"), "A", id.as_str(), "depends_on"),
                    )
                    .unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..50 {
                let report = engine.validate(&dev()).unwrap();
                assert!(!report.has_errors(), "{:?}", report.issues);
            }
        });
    });
}
