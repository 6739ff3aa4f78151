use octofhir_fhirshape::*;
use serde_json::{Value, json};

#[allow(dead_code)]
pub fn patient_schema(cache: &SchemaCache) -> Schema {
    cache
        .resource(ResourceKind::Patient, ShapeOptions::default())
        .unwrap()
}

#[allow(dead_code)]
pub fn valid_coding() -> Value {
    json!({
        "system": "http://terminology.hl7.org/CodeSystem/audit-event-type",
        "code": "rest",
        "display": "RESTful Operation"
    })
}

#[allow(dead_code)]
pub fn audit_event() -> Value {
    json!({
        "resourceType": "AuditEvent",
        "type": valid_coding(),
        "recorded": "2024-01-01T00:00:00Z",
        "agent": [{ "requestor": true }],
        "source": { "observer": { "reference": "X" } }
    })
}

#[allow(dead_code)]
pub fn codeable_concept(code: &str) -> Value {
    json!({ "coding": [{ "system": "http://loinc.org", "code": code }] })
}

/// Smallest document that satisfies every required field of `kind`
#[allow(dead_code)]
pub fn minimal_resource(kind: ResourceKind) -> Value {
    let reference = json!({ "reference": "Patient/example" });
    let mut value = match kind {
        ResourceKind::AllergyIntolerance => json!({ "patient": reference }),
        ResourceKind::AuditEvent => audit_event(),
        ResourceKind::Basic => json!({ "code": codeable_concept("basic") }),
        ResourceKind::Binary => json!({ "contentType": "application/pdf" }),
        ResourceKind::Bundle => json!({ "type": "collection" }),
        ResourceKind::Condition => json!({ "subject": reference }),
        ResourceKind::DocumentReference => json!({
            "status": "current",
            "content": [{ "attachment": { "contentType": "text/plain" } }]
        }),
        ResourceKind::Encounter => json!({
            "status": "finished",
            "class": { "code": "AMB" }
        }),
        ResourceKind::Group => json!({ "type": "person", "actual": true }),
        ResourceKind::MedicationRequest => json!({
            "status": "active",
            "intent": "order",
            "medicationCodeableConcept": codeable_concept("1049502"),
            "subject": reference
        }),
        ResourceKind::Observation => json!({
            "status": "final",
            "code": codeable_concept("8867-4")
        }),
        ResourceKind::OperationOutcome => json!({
            "issue": [{ "severity": "error", "code": "invalid" }]
        }),
        ResourceKind::Provenance => json!({
            "target": [reference],
            "recorded": "2024-01-01T00:00:00Z",
            "agent": [{ "who": { "reference": "Practitioner/1" } }]
        }),
        ResourceKind::RelatedPerson => json!({ "patient": reference }),
        _ => json!({}),
    };
    value["resourceType"] = json!(kind.as_str());
    value
}

#[allow(dead_code)]
pub fn bundle_with(resources: Vec<Value>) -> Value {
    let entries: Vec<Value> = resources
        .into_iter()
        .map(|resource| json!({ "resource": resource }))
        .collect();
    json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": entries
    })
}
