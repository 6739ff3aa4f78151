mod common;

use common::*;
use octofhir_fhirshape::*;
use serde_json::json;
use std::sync::Barrier;
use std::thread;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_handles_are_thread_safe() {
    assert_send_sync::<SchemaCache>();
    assert_send_sync::<Schema>();
    assert_send_sync::<ShapeError>();
    assert_send_sync::<FhirShapeError>();
}

#[test]
fn test_equal_keys_share_one_schema() {
    let cache = SchemaCache::new();
    let first = patient_schema(&cache);
    let entries = cache.len();

    let second = patient_schema(&cache);
    assert_eq!(first, second);
    assert_eq!(first.id(), second.id());
    assert_eq!(cache.len(), entries);

    let any = cache.any_resource().unwrap();
    assert_eq!(any, cache.any_resource().unwrap());
    assert_eq!(any.name(), "Resource");
}

#[test]
fn test_contained_parameter_is_part_of_the_key() {
    let cache = SchemaCache::new();
    let default = patient_schema(&cache);
    let forbidden = cache
        .resource(ResourceKind::Patient, ShapeOptions::forbid_contained())
        .unwrap();
    let organization = cache
        .resource(ResourceKind::Organization, ShapeOptions::default())
        .unwrap();
    let custom = cache
        .resource(
            ResourceKind::Patient,
            ShapeOptions::with_contained(organization.clone()),
        )
        .unwrap();

    assert_ne!(default, forbidden);
    assert_ne!(default, custom);
    assert_ne!(forbidden, custom);

    let key = custom.key().unwrap();
    assert_eq!(key.name, "Patient");
    assert_eq!(key.params, vec![organization.id()]);

    let again = cache
        .resource(ResourceKind::Patient, ShapeOptions::with_contained(organization))
        .unwrap();
    assert_eq!(custom, again);
}

#[test]
fn test_datatypes_are_shared_across_resources() {
    let cache = SchemaCache::new();
    let patient = patient_schema(&cache);
    let after_patient = cache.len();

    let human_name = cache.datatype(ComplexType::HumanName).unwrap();
    assert_eq!(cache.len(), after_patient);

    let summary = patient.describe().unwrap();
    assert_eq!(summary.field("name").unwrap().kind, human_name.name());
}

#[test]
fn test_schema_from_another_cache_is_rejected() {
    let ours = SchemaCache::new();
    let theirs = SchemaCache::new();
    let foreign = theirs
        .resource(ResourceKind::Organization, ShapeOptions::default())
        .unwrap();

    let result = ours.resource(ResourceKind::Patient, ShapeOptions::with_contained(foreign));
    assert!(matches!(result, Err(FhirShapeError::ForeignSchema { .. })));
    assert!(ours.is_empty());

    let ours_patient = patient_schema(&ours);
    let theirs_patient = patient_schema(&theirs);
    assert_ne!(ours_patient, theirs_patient);
}

#[test]
fn test_unsupported_kind_is_a_construction_error() {
    let cache = SchemaCache::new();
    let result = cache.resource(ResourceKind::CarePlan, ShapeOptions::default());
    match result {
        Err(FhirShapeError::UnsupportedKind { kind }) => assert_eq!(kind, "CarePlan"),
        other => panic!("expected UnsupportedKind, got {other:?}"),
    }
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_first_access_builds_once() {
    let cache = SchemaCache::new();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let ids: Vec<SchemaId> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    patient_schema(&cache).id()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));

    let stats = cache.stats();
    assert_eq!(stats.misses as usize, stats.entries);
    assert_eq!(stats.rollbacks, 0);
}

#[test]
fn test_validation_runs_in_parallel() {
    let cache = SchemaCache::new();
    let any = cache.any_resource().unwrap();

    thread::scope(|scope| {
        for kind in ResourceKind::supported() {
            let any = &any;
            scope.spawn(move || {
                let document = minimal_resource(kind);
                assert!(any.is_valid(&document), "{kind} rejected");
            });
        }
    });
}

#[test]
fn test_warm_up_builds_everything_once() {
    let cache = SchemaCache::new();
    let report = cache.warm_up().unwrap();

    assert!(report.built > 0);
    assert_eq!(report.total, cache.len());
    assert_eq!(report.resource_kinds, ResourceKind::supported().count());

    let again = cache.warm_up().unwrap();
    assert_eq!(again.built, 0);
    assert_eq!(again.total, report.total);

    let misses = cache.stats().misses;
    patient_schema(&cache);
    cache.datatype(ComplexType::Dosage).unwrap();
    assert_eq!(cache.stats().misses, misses);
    assert!(cache.stats().hits > 0);
}

#[test]
fn test_eager_warm_up_from_config() {
    let config = ValidationConfig::default().with_eager_warm_up(true);
    let cache = SchemaCache::with_config(config).unwrap();
    assert!(!cache.is_empty());

    let lazy = SchemaCache::new();
    lazy.warm_up().unwrap();
    assert_eq!(cache.len(), lazy.len());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ValidationConfig::default().with_max_recursion_depth(0);
    assert!(matches!(
        SchemaCache::with_config(config),
        Err(FhirShapeError::Config { .. })
    ));
}

#[test]
fn test_recursion_limit_from_config() {
    let config = ValidationConfig::default().with_max_recursion_depth(4);
    let cache = SchemaCache::with_config(config).unwrap();
    let patient = patient_schema(&cache);

    let shallow = json!({
        "resourceType": "Patient",
        "contained": [{ "resourceType": "Organization", "name": "ACME" }]
    });
    assert!(patient.is_valid(&shallow));

    let deep = json!({
        "resourceType": "Patient",
        "contained": [{
            "resourceType": "Organization",
            "contained": [{
                "resourceType": "Organization",
                "contained": [{
                    "resourceType": "Organization",
                    "contained": [{ "resourceType": "Organization" }]
                }]
            }]
        }]
    });
    let err = patient.validate(&deep).unwrap_err();
    assert!(err.has_issue_at(
        IssueKind::RecursionLimit,
        "contained[0].contained[0].contained[0].contained[0]"
    ));
}

#[test]
fn test_stats_serialize() {
    let cache = SchemaCache::new();
    patient_schema(&cache);
    let stats = serde_json::to_value(cache.stats()).unwrap();
    assert!(stats["entries"].as_u64().unwrap() > 0);
    assert_eq!(stats["rollbacks"], 0);
}
