mod common;

use common::*;
use octofhir_fhirshape::*;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;

#[test]
fn test_minimal_patient() {
    let cache = SchemaCache::new();
    let patient = patient_schema(&cache);

    let document = json!({ "resourceType": "Patient", "gender": "unknown", "active": true });
    let validated = patient.validate(&document).unwrap();

    assert_eq!(validated.kind(), Some(ResourceKind::Patient));
    assert_eq!(validated.value(), &document);
}

#[test]
fn test_audit_event_required_fields() {
    let cache = SchemaCache::new();
    let audit = cache
        .resource(ResourceKind::AuditEvent, ShapeOptions::default())
        .unwrap();

    let document = audit_event();
    assert!(audit.validate(&document).is_ok());

    let mut missing = document.clone();
    missing.as_object_mut().unwrap().remove("recorded");
    let err = audit.validate(&missing).unwrap_err();

    let reported: Vec<(String, IssueKind)> = err
        .issues()
        .iter()
        .map(|issue| (issue.path.to_string(), issue.kind))
        .collect();
    assert_eq!(
        reported,
        vec![("recorded".to_string(), IssueKind::MissingRequiredField)]
    );
}

#[test]
fn test_audit_event_action_enumeration() {
    let cache = SchemaCache::new();
    let audit = cache
        .resource(ResourceKind::AuditEvent, ShapeOptions::default())
        .unwrap();

    let mut document = audit_event();
    for action in ["C", "R", "U", "D", "E"] {
        document["action"] = json!(action);
        assert!(audit.is_valid(&document), "action {action} rejected");
    }

    document["action"] = json!("Z");
    let err = audit.validate(&document).unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err.issues[0].kind, IssueKind::EnumMismatch);
    assert_eq!(err.issues[0].path.to_string(), "action");
}

#[test]
fn test_bundle_with_unknown_kind() {
    let cache = SchemaCache::new();
    let bundle = bundle_with(vec![json!({ "resourceType": "NotAKind", "id": "1" })]);

    let err = cache.validate_any_resource(&bundle).unwrap_err();
    let shape_error = err.as_shape_error().unwrap();
    assert_eq!(shape_error.shape, "Resource");
    assert!(shape_error.has_issue_at(IssueKind::UnknownKind, "entry[0].resource.resourceType"));
    assert_eq!(shape_error.len(), 1);
}

#[test]
fn test_bundle_of_mixed_resources() {
    let cache = SchemaCache::new();
    let bundle = bundle_with(vec![
        minimal_resource(ResourceKind::Patient),
        minimal_resource(ResourceKind::Observation),
        json!({ "resourceType": "Patient", "gender": "robot" }),
        minimal_resource(ResourceKind::AuditEvent),
    ]);

    let err = cache.validate_any_resource(&bundle).unwrap_err();
    let issues = err.as_shape_error().unwrap();
    assert_eq!(issues.len(), 1);
    assert!(issues.has_issue_at(IssueKind::EnumMismatch, "entry[2].resource.gender"));

    let mut fixed = bundle.clone();
    fixed["entry"][2]["resource"]["gender"] = json!("other");
    let validated = cache.validate_any_resource(&fixed).unwrap();
    assert_eq!(validated.kind(), Some(ResourceKind::Bundle));
}

#[test]
fn test_parameters_nest_parts_and_resources() {
    let cache = SchemaCache::new();
    let parameters = json!({
        "resourceType": "Parameters",
        "parameter": [
            { "name": "count", "valueInteger": 3 },
            {
                "name": "result",
                "part": [
                    { "name": "match", "resource": minimal_resource(ResourceKind::Patient) },
                    { "name": "score", "valueDecimal": 0.9, "part": [{ "name": "deep" }] }
                ]
            }
        ]
    });
    assert!(cache.validate_any_resource(&parameters).is_ok());

    let mut broken = parameters.clone();
    broken["parameter"][1]["part"][1]["part"][0] = json!({ "value": 1 });
    let err = cache.validate_any_resource(&broken).unwrap_err();
    let issues = err.as_shape_error().unwrap();
    assert!(issues.has_issue_at(
        IssueKind::MissingRequiredField,
        "parameter[1].part[1].part[0].name"
    ));
    assert!(issues.has_issue_at(IssueKind::UnknownField, "parameter[1].part[1].part[0].value"));
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct PatientView {
    resource_type: String,
    gender: Option<String>,
    birth_date: Option<String>,
}

#[test]
fn test_validated_value_deserializes() {
    let cache = SchemaCache::new();
    let patient = patient_schema(&cache);

    let validated = patient
        .validate(&json!({
            "resourceType": "Patient",
            "gender": "female",
            "birthDate": "1974-12-25"
        }))
        .unwrap();
    let view: PatientView = validated.deserialize().unwrap();

    assert_eq!(
        view,
        PatientView {
            resource_type: "Patient".to_string(),
            gender: Some("female".to_string()),
            birth_date: Some("1974-12-25".to_string()),
        }
    );
}

#[test]
fn test_describe_patient() {
    let cache = SchemaCache::new();
    let summary = patient_schema(&cache).describe().unwrap();

    assert_eq!(summary.name, "Patient");
    assert_eq!(summary.discriminator.as_deref(), Some("Patient"));

    let gender = summary.field("gender").unwrap();
    assert_eq!(gender.cardinality, "0..1");
    assert_eq!(gender.kind, "code {male | female | other | unknown}");
    assert!(gender.shadow);

    let deceased = summary.field("deceasedDateTime").unwrap();
    assert_eq!(deceased.choice_of.as_deref(), Some("deceased"));

    let contained = summary.field("contained").unwrap();
    assert_eq!(contained.cardinality, "0..*");
    assert_eq!(contained.kind, "contained Resource");

    let groups: Vec<String> = summary.groups.iter().map(|group| group.label()).collect();
    assert_eq!(groups, vec!["deceased[x]", "multipleBirth[x]"]);
}
