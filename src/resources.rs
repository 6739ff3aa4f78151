//! Resource shape definitions (FHIR R4).
//!
//! Each definition receives the resource builder (discriminator and Resource
//! fields already declared) and the id of the element schema for its
//! `contained` slot. Resources are cached under `(kind, [contained])`.

use crate::builder::{
    BASE64_BINARY, BOOLEAN, CANONICAL, CODE, DATE, DATE_TIME, DECIMAL, INSTANT, INTEGER,
    POSITIVE_INT, RESOURCE, STRING, ShapeBuilder, TIME, Ty, UNSIGNED_INT, URI, code,
};
use crate::cache::BuildContext;
use crate::datatypes::{ComplexType as T, DAYS_OF_WEEK, OPEN_TYPES};
use crate::error::{FhirShapeError, Result};
use crate::registry::ResourceKind;
use crate::shape::{SchemaId, SchemaKey};

type Definition = for<'b, 'c> fn(ShapeBuilder<'b, 'c>, SchemaId) -> ShapeBuilder<'b, 'c>;

/// Resource kinds with a shape definition
pub const TRANSCRIBED: &[ResourceKind] = &[
    ResourceKind::AllergyIntolerance,
    ResourceKind::AuditEvent,
    ResourceKind::Basic,
    ResourceKind::Binary,
    ResourceKind::Bundle,
    ResourceKind::Condition,
    ResourceKind::Device,
    ResourceKind::DocumentReference,
    ResourceKind::Encounter,
    ResourceKind::Group,
    ResourceKind::Location,
    ResourceKind::Medication,
    ResourceKind::MedicationRequest,
    ResourceKind::Observation,
    ResourceKind::OperationOutcome,
    ResourceKind::Organization,
    ResourceKind::Parameters,
    ResourceKind::Patient,
    ResourceKind::Person,
    ResourceKind::Practitioner,
    ResourceKind::Provenance,
    ResourceKind::RelatedPerson,
];

fn definition(kind: ResourceKind) -> Option<Definition> {
    let define: Definition = match kind {
        ResourceKind::AllergyIntolerance => allergy_intolerance,
        ResourceKind::AuditEvent => audit_event,
        ResourceKind::Basic => basic,
        ResourceKind::Binary => binary,
        ResourceKind::Bundle => bundle,
        ResourceKind::Condition => condition,
        ResourceKind::Device => device,
        ResourceKind::DocumentReference => document_reference,
        ResourceKind::Encounter => encounter,
        ResourceKind::Group => group,
        ResourceKind::Location => location,
        ResourceKind::Medication => medication,
        ResourceKind::MedicationRequest => medication_request,
        ResourceKind::Observation => observation,
        ResourceKind::OperationOutcome => operation_outcome,
        ResourceKind::Organization => organization,
        ResourceKind::Parameters => parameters,
        ResourceKind::Patient => patient,
        ResourceKind::Person => person,
        ResourceKind::Practitioner => practitioner,
        ResourceKind::Provenance => provenance,
        ResourceKind::RelatedPerson => related_person,
        _ => return None,
    };
    Some(define)
}

pub(crate) fn is_transcribed(kind: ResourceKind) -> bool {
    definition(kind).is_some()
}

/// Cache key of `kind` parameterized over the `contained` element schema
pub(crate) fn key(kind: ResourceKind, contained: SchemaId) -> SchemaKey {
    SchemaKey::with_params(kind.as_str(), vec![contained])
}

/// Id of `kind` parameterized over the `contained` element schema
pub(crate) fn resolve(
    ctx: &mut BuildContext<'_>,
    kind: ResourceKind,
    contained: SchemaId,
) -> Result<SchemaId> {
    let define = definition(kind).ok_or_else(|| FhirShapeError::unsupported_kind(kind.as_str()))?;
    ctx.resolve(key(kind, contained), |ctx, id| {
        define(ShapeBuilder::resource(ctx, id, kind), contained).finish()
    })
}

const CONCEPT: Ty = Ty::Complex(T::CodeableConcept);
const REFERENCE: Ty = Ty::Complex(T::Reference);
const QUANTITY: Ty = Ty::Complex(T::Quantity);
const PERIOD: Ty = Ty::Complex(T::Period);
const RANGE: Ty = Ty::Complex(T::Range);
const RATIO: Ty = Ty::Complex(T::Ratio);
const AGE: Ty = Ty::Complex(T::Age);

const ADMINISTRATIVE_GENDER: &[&str] = &["male", "female", "other", "unknown"];

const ONSET_TYPES: &[Ty] = &[DATE_TIME, AGE, PERIOD, RANGE, STRING];

const OBSERVATION_VALUE_TYPES: &[Ty] = &[
    QUANTITY,
    CONCEPT,
    STRING,
    BOOLEAN,
    INTEGER,
    RANGE,
    RATIO,
    Ty::Complex(T::SampledData),
    TIME,
    DATE_TIME,
    PERIOD,
];

const ISSUE_TYPE: &[&str] = &[
    "invalid",
    "structure",
    "required",
    "value",
    "invariant",
    "security",
    "login",
    "unknown",
    "expired",
    "forbidden",
    "suppressed",
    "processing",
    "not-supported",
    "duplicate",
    "multiple-matches",
    "not-found",
    "deleted",
    "too-long",
    "code-invalid",
    "extension",
    "too-costly",
    "business-rule",
    "conflict",
    "transient",
    "lock-error",
    "no-store",
    "exception",
    "timeout",
    "incomplete",
    "throttled",
    "informational",
];

const ENCOUNTER_STATUS: &[&str] = &[
    "planned",
    "arrived",
    "triaged",
    "in-progress",
    "onleave",
    "finished",
    "cancelled",
    "entered-in-error",
    "unknown",
];

// Backbones shared by more than one field

fn bundle_link(ctx: &mut BuildContext<'_>) -> Result<SchemaId> {
    ctx.resolve(SchemaKey::new("Bundle.link"), |ctx, id| {
        ShapeBuilder::object(ctx, id, "Bundle.link")
            .backbone_base()
            .required("relation", STRING)
            .required("url", URI)
            .finish()
    })
}

fn observation_reference_range(ctx: &mut BuildContext<'_>) -> Result<SchemaId> {
    ctx.resolve(SchemaKey::new("Observation.referenceRange"), |ctx, id| {
        ShapeBuilder::object(ctx, id, "Observation.referenceRange")
            .backbone_base()
            .optional("low", T::SimpleQuantity)
            .optional("high", T::SimpleQuantity)
            .optional("type", T::CodeableConcept)
            .many("appliesTo", T::CodeableConcept)
            .optional("age", T::Range)
            .optional("text", STRING)
            .finish()
    })
}

fn provenance_agent(ctx: &mut BuildContext<'_>) -> Result<SchemaId> {
    ctx.resolve(SchemaKey::new("Provenance.agent"), |ctx, id| {
        ShapeBuilder::object(ctx, id, "Provenance.agent")
            .backbone_base()
            .optional("type", T::CodeableConcept)
            .many("role", T::CodeableConcept)
            .required("who", T::Reference)
            .optional("onBehalfOf", T::Reference)
            .finish()
    })
}

fn patient<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("active", BOOLEAN)
        .many("name", T::HumanName)
        .many("telecom", T::ContactPoint)
        .optional("gender", code(ADMINISTRATIVE_GENDER))
        .optional("birthDate", DATE)
        .choice("deceased", false, &[BOOLEAN, DATE_TIME])
        .many("address", T::Address)
        .optional("maritalStatus", T::CodeableConcept)
        .choice("multipleBirth", false, &[BOOLEAN, INTEGER])
        .many("photo", T::Attachment)
        .backbone_many("contact", "Patient.contact", |c| {
            c.many("relationship", T::CodeableConcept)
                .optional("name", T::HumanName)
                .many("telecom", T::ContactPoint)
                .optional("address", T::Address)
                .optional("gender", code(ADMINISTRATIVE_GENDER))
                .optional("organization", T::Reference)
                .optional("period", T::Period)
        })
        .backbone_many("communication", "Patient.communication", |c| {
            c.required("language", T::CodeableConcept)
                .optional("preferred", BOOLEAN)
        })
        .many("generalPractitioner", T::Reference)
        .optional("managingOrganization", T::Reference)
        .backbone_many("link", "Patient.link", |l| {
            l.required("other", T::Reference).required(
                "type",
                code(&["replaced-by", "replaces", "refer", "seealso"]),
            )
        })
}

fn audit_event<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .required("type", T::Coding)
        .many("subtype", T::Coding)
        .optional("action", code(&["C", "R", "U", "D", "E"]))
        .optional("period", T::Period)
        .required("recorded", INSTANT)
        .optional("outcome", code(&["0", "4", "8", "12"]))
        .optional("outcomeDesc", STRING)
        .many("purposeOfEvent", T::CodeableConcept)
        .required_backbone_many("agent", "AuditEvent.agent", |a| {
            a.optional("type", T::CodeableConcept)
                .many("role", T::CodeableConcept)
                .optional("who", T::Reference)
                .optional("altId", STRING)
                .optional("name", STRING)
                .required("requestor", BOOLEAN)
                .optional("location", T::Reference)
                .many("policy", URI)
                .optional("media", T::Coding)
                .backbone("network", "AuditEvent.agent.network", |n| {
                    n.optional("address", STRING)
                        .optional("type", code(&["1", "2", "3", "4", "5"]))
                })
                .many("purposeOfUse", T::CodeableConcept)
        })
        .required_backbone("source", "AuditEvent.source", |s| {
            s.optional("site", STRING)
                .required("observer", T::Reference)
                .many("type", T::Coding)
        })
        .backbone_many("entity", "AuditEvent.entity", |e| {
            e.optional("what", T::Reference)
                .optional("type", T::Coding)
                .optional("role", T::Coding)
                .optional("lifecycle", T::Coding)
                .many("securityLabel", T::Coding)
                .optional("name", STRING)
                .optional("description", STRING)
                .optional("query", BASE64_BINARY)
                .backbone_many("detail", "AuditEvent.entity.detail", |d| {
                    d.required("type", STRING)
                        .choice("value", true, &[STRING, BASE64_BINARY])
                })
        })
}

/// Bundle derives from Resource, so it has no `contained` slot
fn bundle<'b, 'c>(b: ShapeBuilder<'b, 'c>, _contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.optional("identifier", T::Identifier)
        .required(
            "type",
            code(&[
                "document",
                "message",
                "transaction",
                "transaction-response",
                "batch",
                "batch-response",
                "history",
                "searchset",
                "collection",
            ]),
        )
        .optional("timestamp", INSTANT)
        .optional("total", UNSIGNED_INT)
        .many("link", Ty::Shared(bundle_link))
        .backbone_many("entry", "Bundle.entry", |e| {
            e.many("link", Ty::Shared(bundle_link))
                .optional("fullUrl", URI)
                .optional("resource", RESOURCE)
                .backbone("search", "Bundle.entry.search", |s| {
                    s.optional("mode", code(&["match", "include", "outcome"]))
                        .optional("score", DECIMAL)
                })
                .backbone("request", "Bundle.entry.request", |r| {
                    r.required(
                        "method",
                        code(&["GET", "HEAD", "POST", "PUT", "DELETE", "PATCH"]),
                    )
                    .required("url", URI)
                    .optional("ifNoneMatch", STRING)
                    .optional("ifModifiedSince", INSTANT)
                    .optional("ifMatch", STRING)
                    .optional("ifNoneExist", STRING)
                })
                .backbone("response", "Bundle.entry.response", |r| {
                    r.required("status", STRING)
                        .optional("location", URI)
                        .optional("etag", STRING)
                        .optional("lastModified", INSTANT)
                        .optional("outcome", RESOURCE)
                })
        })
        .optional("signature", T::Signature)
}

fn observation<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .many("basedOn", T::Reference)
        .many("partOf", T::Reference)
        .required(
            "status",
            code(&[
                "registered",
                "preliminary",
                "final",
                "amended",
                "corrected",
                "cancelled",
                "entered-in-error",
                "unknown",
            ]),
        )
        .many("category", T::CodeableConcept)
        .required("code", T::CodeableConcept)
        .optional("subject", T::Reference)
        .many("focus", T::Reference)
        .optional("encounter", T::Reference)
        .choice(
            "effective",
            false,
            &[DATE_TIME, PERIOD, Ty::Complex(T::Timing), INSTANT],
        )
        .optional("issued", INSTANT)
        .many("performer", T::Reference)
        .choice("value", false, OBSERVATION_VALUE_TYPES)
        .optional("dataAbsentReason", T::CodeableConcept)
        .many("interpretation", T::CodeableConcept)
        .many("note", T::Annotation)
        .optional("bodySite", T::CodeableConcept)
        .optional("method", T::CodeableConcept)
        .optional("specimen", T::Reference)
        .optional("device", T::Reference)
        .many("referenceRange", Ty::Shared(observation_reference_range))
        .many("hasMember", T::Reference)
        .many("derivedFrom", T::Reference)
        .backbone_many("component", "Observation.component", |c| {
            c.required("code", T::CodeableConcept)
                .choice("value", false, OBSERVATION_VALUE_TYPES)
                .optional("dataAbsentReason", T::CodeableConcept)
                .many("interpretation", T::CodeableConcept)
                .many("referenceRange", Ty::Shared(observation_reference_range))
        })
}

fn organization<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("active", BOOLEAN)
        .many("type", T::CodeableConcept)
        .optional("name", STRING)
        .many("alias", STRING)
        .many("telecom", T::ContactPoint)
        .many("address", T::Address)
        .optional("partOf", T::Reference)
        .backbone_many("contact", "Organization.contact", |c| {
            c.optional("purpose", T::CodeableConcept)
                .optional("name", T::HumanName)
                .many("telecom", T::ContactPoint)
                .optional("address", T::Address)
        })
        .many("endpoint", T::Reference)
}

fn practitioner<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("active", BOOLEAN)
        .many("name", T::HumanName)
        .many("telecom", T::ContactPoint)
        .many("address", T::Address)
        .optional("gender", code(ADMINISTRATIVE_GENDER))
        .optional("birthDate", DATE)
        .many("photo", T::Attachment)
        .backbone_many("qualification", "Practitioner.qualification", |q| {
            q.many("identifier", T::Identifier)
                .required("code", T::CodeableConcept)
                .optional("period", T::Period)
                .optional("issuer", T::Reference)
        })
        .many("communication", T::CodeableConcept)
}

fn encounter<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .required("status", code(ENCOUNTER_STATUS))
        .backbone_many("statusHistory", "Encounter.statusHistory", |h| {
            h.required("status", code(ENCOUNTER_STATUS))
                .required("period", T::Period)
        })
        .required("class", T::Coding)
        .backbone_many("classHistory", "Encounter.classHistory", |h| {
            h.required("class", T::Coding).required("period", T::Period)
        })
        .many("type", T::CodeableConcept)
        .optional("serviceType", T::CodeableConcept)
        .optional("priority", T::CodeableConcept)
        .optional("subject", T::Reference)
        .many("episodeOfCare", T::Reference)
        .many("basedOn", T::Reference)
        .backbone_many("participant", "Encounter.participant", |p| {
            p.many("type", T::CodeableConcept)
                .optional("period", T::Period)
                .optional("individual", T::Reference)
        })
        .many("appointment", T::Reference)
        .optional("period", T::Period)
        .optional("length", T::Duration)
        .many("reasonCode", T::CodeableConcept)
        .many("reasonReference", T::Reference)
        .backbone_many("diagnosis", "Encounter.diagnosis", |d| {
            d.required("condition", T::Reference)
                .optional("use", T::CodeableConcept)
                .optional("rank", POSITIVE_INT)
        })
        .many("account", T::Reference)
        .backbone("hospitalization", "Encounter.hospitalization", |h| {
            h.optional("preAdmissionIdentifier", T::Identifier)
                .optional("origin", T::Reference)
                .optional("admitSource", T::CodeableConcept)
                .optional("reAdmission", T::CodeableConcept)
                .many("dietPreference", T::CodeableConcept)
                .many("specialCourtesy", T::CodeableConcept)
                .many("specialArrangement", T::CodeableConcept)
                .optional("destination", T::Reference)
                .optional("dischargeDisposition", T::CodeableConcept)
        })
        .backbone_many("location", "Encounter.location", |l| {
            l.required("location", T::Reference)
                .optional(
                    "status",
                    code(&["planned", "active", "reserved", "completed"]),
                )
                .optional("physicalType", T::CodeableConcept)
                .optional("period", T::Period)
        })
        .optional("serviceProvider", T::Reference)
        .optional("partOf", T::Reference)
}

fn condition<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("clinicalStatus", T::CodeableConcept)
        .optional("verificationStatus", T::CodeableConcept)
        .many("category", T::CodeableConcept)
        .optional("severity", T::CodeableConcept)
        .optional("code", T::CodeableConcept)
        .many("bodySite", T::CodeableConcept)
        .required("subject", T::Reference)
        .optional("encounter", T::Reference)
        .choice("onset", false, ONSET_TYPES)
        .choice("abatement", false, ONSET_TYPES)
        .optional("recordedDate", DATE_TIME)
        .optional("recorder", T::Reference)
        .optional("asserter", T::Reference)
        .backbone_many("stage", "Condition.stage", |s| {
            s.optional("summary", T::CodeableConcept)
                .many("assessment", T::Reference)
                .optional("type", T::CodeableConcept)
        })
        .backbone_many("evidence", "Condition.evidence", |e| {
            e.many("code", T::CodeableConcept).many("detail", T::Reference)
        })
        .many("note", T::Annotation)
}

fn basic<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .required("code", T::CodeableConcept)
        .optional("subject", T::Reference)
        .optional("created", DATE)
        .optional("author", T::Reference)
}

/// Binary derives from Resource, so it has no `contained` slot
fn binary<'b, 'c>(b: ShapeBuilder<'b, 'c>, _contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.required("contentType", CODE)
        .optional("securityContext", T::Reference)
        .optional("data", BASE64_BINARY)
}

fn operation_outcome<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .required_backbone_many("issue", "OperationOutcome.issue", |i| {
            i.required(
                "severity",
                code(&["fatal", "error", "warning", "information"]),
            )
            .required("code", code(ISSUE_TYPE))
            .optional("details", T::CodeableConcept)
            .optional("diagnostics", STRING)
            .many("location", STRING)
            .many("expression", STRING)
        })
}

/// Parameters derives from Resource; `part` nests parameters recursively
fn parameters<'b, 'c>(b: ShapeBuilder<'b, 'c>, _contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.backbone_many("parameter", "Parameters.parameter", |p| {
        p.required("name", STRING)
            .choice("value", false, OPEN_TYPES)
            .optional("resource", RESOURCE)
            .many("part", Ty::SelfRef)
    })
}

fn provenance<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .required_many("target", T::Reference)
        .choice("occurred", false, &[PERIOD, DATE_TIME])
        .required("recorded", INSTANT)
        .many("policy", URI)
        .optional("location", T::Reference)
        .many("reason", T::CodeableConcept)
        .optional("activity", T::CodeableConcept)
        .required_many("agent", Ty::Shared(provenance_agent))
        .backbone_many("entity", "Provenance.entity", |e| {
            e.required(
                "role",
                code(&["derivation", "revision", "quotation", "source", "removal"]),
            )
            .required("what", T::Reference)
            .many("agent", Ty::Shared(provenance_agent))
        })
        .many("signature", T::Signature)
}

fn medication<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("code", T::CodeableConcept)
        .optional("status", code(&["active", "inactive", "entered-in-error"]))
        .optional("manufacturer", T::Reference)
        .optional("form", T::CodeableConcept)
        .optional("amount", T::Ratio)
        .backbone_many("ingredient", "Medication.ingredient", |i| {
            i.choice("item", true, &[CONCEPT, REFERENCE])
                .optional("isActive", BOOLEAN)
                .optional("strength", T::Ratio)
        })
        .backbone("batch", "Medication.batch", |batch| {
            batch
                .optional("lotNumber", STRING)
                .optional("expirationDate", DATE_TIME)
        })
}

fn medication_request<'b, 'c>(
    b: ShapeBuilder<'b, 'c>,
    contained: SchemaId,
) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .required(
            "status",
            code(&[
                "active",
                "on-hold",
                "cancelled",
                "completed",
                "entered-in-error",
                "stopped",
                "draft",
                "unknown",
            ]),
        )
        .optional("statusReason", T::CodeableConcept)
        .required(
            "intent",
            code(&[
                "proposal",
                "plan",
                "order",
                "original-order",
                "reflex-order",
                "filler-order",
                "instance-order",
                "option",
            ]),
        )
        .many("category", T::CodeableConcept)
        .optional("priority", code(&["routine", "urgent", "asap", "stat"]))
        .optional("doNotPerform", BOOLEAN)
        .choice("reported", false, &[BOOLEAN, REFERENCE])
        .choice("medication", true, &[CONCEPT, REFERENCE])
        .required("subject", T::Reference)
        .optional("encounter", T::Reference)
        .many("supportingInformation", T::Reference)
        .optional("authoredOn", DATE_TIME)
        .optional("requester", T::Reference)
        .optional("performer", T::Reference)
        .optional("performerType", T::CodeableConcept)
        .optional("recorder", T::Reference)
        .many("reasonCode", T::CodeableConcept)
        .many("reasonReference", T::Reference)
        .many("instantiatesCanonical", CANONICAL)
        .many("instantiatesUri", URI)
        .many("basedOn", T::Reference)
        .optional("groupIdentifier", T::Identifier)
        .optional("courseOfTherapyType", T::CodeableConcept)
        .many("insurance", T::Reference)
        .many("note", T::Annotation)
        .many("dosageInstruction", T::Dosage)
        .backbone(
            "dispenseRequest",
            "MedicationRequest.dispenseRequest",
            |d| {
                d.backbone(
                    "initialFill",
                    "MedicationRequest.dispenseRequest.initialFill",
                    |i| {
                        i.optional("quantity", T::SimpleQuantity)
                            .optional("duration", T::Duration)
                    },
                )
                .optional("dispenseInterval", T::Duration)
                .optional("validityPeriod", T::Period)
                .optional("numberOfRepeatsAllowed", UNSIGNED_INT)
                .optional("quantity", T::SimpleQuantity)
                .optional("expectedSupplyDuration", T::Duration)
                .optional("performer", T::Reference)
            },
        )
        .backbone("substitution", "MedicationRequest.substitution", |s| {
            s.choice("allowed", true, &[BOOLEAN, CONCEPT])
                .optional("reason", T::CodeableConcept)
        })
        .optional("priorPrescription", T::Reference)
        .many("detectedIssue", T::Reference)
        .many("eventHistory", T::Reference)
}

fn allergy_intolerance<'b, 'c>(
    b: ShapeBuilder<'b, 'c>,
    contained: SchemaId,
) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("clinicalStatus", T::CodeableConcept)
        .optional("verificationStatus", T::CodeableConcept)
        .optional("type", code(&["allergy", "intolerance"]))
        .many(
            "category",
            code(&["food", "medication", "environment", "biologic"]),
        )
        .optional("criticality", code(&["low", "high", "unable-to-assess"]))
        .optional("code", T::CodeableConcept)
        .required("patient", T::Reference)
        .optional("encounter", T::Reference)
        .choice("onset", false, ONSET_TYPES)
        .optional("recordedDate", DATE_TIME)
        .optional("recorder", T::Reference)
        .optional("asserter", T::Reference)
        .optional("lastOccurrence", DATE_TIME)
        .many("note", T::Annotation)
        .backbone_many("reaction", "AllergyIntolerance.reaction", |r| {
            r.optional("substance", T::CodeableConcept)
                .required_many("manifestation", T::CodeableConcept)
                .optional("description", STRING)
                .optional("onset", DATE_TIME)
                .optional("severity", code(&["mild", "moderate", "severe"]))
                .optional("exposureRoute", T::CodeableConcept)
                .many("note", T::Annotation)
        })
}

fn device<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("definition", T::Reference)
        .backbone_many("udiCarrier", "Device.udiCarrier", |u| {
            u.optional("deviceIdentifier", STRING)
                .optional("issuer", URI)
                .optional("jurisdiction", URI)
                .optional("carrierAIDC", BASE64_BINARY)
                .optional("carrierHRF", STRING)
                .optional(
                    "entryType",
                    code(&["barcode", "rfid", "manual", "card", "self-reported", "unknown"]),
                )
        })
        .optional(
            "status",
            code(&["active", "inactive", "entered-in-error", "unknown"]),
        )
        .many("statusReason", T::CodeableConcept)
        .optional("distinctIdentifier", STRING)
        .optional("manufacturer", STRING)
        .optional("manufactureDate", DATE_TIME)
        .optional("expirationDate", DATE_TIME)
        .optional("lotNumber", STRING)
        .optional("serialNumber", STRING)
        .backbone_many("deviceName", "Device.deviceName", |n| {
            n.required("name", STRING).required(
                "type",
                code(&[
                    "udi-label-name",
                    "user-friendly-name",
                    "patient-reported-name",
                    "manufacturer-name",
                    "model-name",
                    "other",
                ]),
            )
        })
        .optional("modelNumber", STRING)
        .optional("partNumber", STRING)
        .optional("type", T::CodeableConcept)
        .backbone_many("specialization", "Device.specialization", |s| {
            s.required("systemType", T::CodeableConcept)
                .optional("version", STRING)
        })
        .backbone_many("version", "Device.version", |v| {
            v.optional("type", T::CodeableConcept)
                .optional("component", T::Identifier)
                .required("value", STRING)
        })
        .backbone_many("property", "Device.property", |p| {
            p.required("type", T::CodeableConcept)
                .many("valueQuantity", T::Quantity)
                .many("valueCode", T::CodeableConcept)
        })
        .optional("patient", T::Reference)
        .optional("owner", T::Reference)
        .many("contact", T::ContactPoint)
        .optional("location", T::Reference)
        .optional("url", URI)
        .many("note", T::Annotation)
        .many("safety", T::CodeableConcept)
        .optional("parent", T::Reference)
}

fn location<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("status", code(&["active", "suspended", "inactive"]))
        .optional("operationalStatus", T::Coding)
        .optional("name", STRING)
        .many("alias", STRING)
        .optional("description", STRING)
        .optional("mode", code(&["instance", "kind"]))
        .many("type", T::CodeableConcept)
        .many("telecom", T::ContactPoint)
        .optional("address", T::Address)
        .optional("physicalType", T::CodeableConcept)
        .backbone("position", "Location.position", |p| {
            p.required("longitude", DECIMAL)
                .required("latitude", DECIMAL)
                .optional("altitude", DECIMAL)
        })
        .optional("managingOrganization", T::Reference)
        .optional("partOf", T::Reference)
        .backbone_many("hoursOfOperation", "Location.hoursOfOperation", |h| {
            h.many("daysOfWeek", code(DAYS_OF_WEEK))
                .optional("allDay", BOOLEAN)
                .optional("openingTime", TIME)
                .optional("closingTime", TIME)
        })
        .optional("availabilityExceptions", STRING)
        .many("endpoint", T::Reference)
}

fn related_person<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("active", BOOLEAN)
        .required("patient", T::Reference)
        .many("relationship", T::CodeableConcept)
        .many("name", T::HumanName)
        .many("telecom", T::ContactPoint)
        .optional("gender", code(ADMINISTRATIVE_GENDER))
        .optional("birthDate", DATE)
        .many("address", T::Address)
        .many("photo", T::Attachment)
        .optional("period", T::Period)
        .backbone_many("communication", "RelatedPerson.communication", |c| {
            c.required("language", T::CodeableConcept)
                .optional("preferred", BOOLEAN)
        })
}

fn person<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .many("name", T::HumanName)
        .many("telecom", T::ContactPoint)
        .optional("gender", code(ADMINISTRATIVE_GENDER))
        .optional("birthDate", DATE)
        .many("address", T::Address)
        .optional("photo", T::Attachment)
        .optional("managingOrganization", T::Reference)
        .optional("active", BOOLEAN)
        .backbone_many("link", "Person.link", |l| {
            l.required("target", T::Reference).optional(
                "assurance",
                code(&["level1", "level2", "level3", "level4"]),
            )
        })
}

fn group<'b, 'c>(b: ShapeBuilder<'b, 'c>, contained: SchemaId) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .many("identifier", T::Identifier)
        .optional("active", BOOLEAN)
        .required(
            "type",
            code(&[
                "person",
                "animal",
                "practitioner",
                "device",
                "medication",
                "substance",
            ]),
        )
        .required("actual", BOOLEAN)
        .optional("code", T::CodeableConcept)
        .optional("name", STRING)
        .optional("quantity", UNSIGNED_INT)
        .optional("managingEntity", T::Reference)
        .backbone_many("characteristic", "Group.characteristic", |c| {
            c.required("code", T::CodeableConcept)
                .choice(
                    "value",
                    true,
                    &[CONCEPT, BOOLEAN, QUANTITY, RANGE, REFERENCE],
                )
                .required("exclude", BOOLEAN)
                .optional("period", T::Period)
        })
        .backbone_many("member", "Group.member", |m| {
            m.required("entity", T::Reference)
                .optional("period", T::Period)
                .optional("inactive", BOOLEAN)
        })
}

fn document_reference<'b, 'c>(
    b: ShapeBuilder<'b, 'c>,
    contained: SchemaId,
) -> ShapeBuilder<'b, 'c> {
    b.domain_resource(contained)
        .optional("masterIdentifier", T::Identifier)
        .many("identifier", T::Identifier)
        .required(
            "status",
            code(&["current", "superseded", "entered-in-error"]),
        )
        .optional(
            "docStatus",
            code(&["preliminary", "final", "amended", "entered-in-error"]),
        )
        .optional("type", T::CodeableConcept)
        .many("category", T::CodeableConcept)
        .optional("subject", T::Reference)
        .optional("date", INSTANT)
        .many("author", T::Reference)
        .optional("authenticator", T::Reference)
        .optional("custodian", T::Reference)
        .backbone_many("relatesTo", "DocumentReference.relatesTo", |r| {
            r.required(
                "code",
                code(&["replaces", "transforms", "signs", "appends"]),
            )
            .required("target", T::Reference)
        })
        .optional("description", STRING)
        .many("securityLabel", T::CodeableConcept)
        .required_backbone_many("content", "DocumentReference.content", |c| {
            c.required("attachment", T::Attachment)
                .optional("format", T::Coding)
        })
        .backbone("context", "DocumentReference.context", |c| {
            c.many("encounter", T::Reference)
                .many("event", T::CodeableConcept)
                .optional("period", T::Period)
                .optional("facilityType", T::CodeableConcept)
                .optional("practiceSetting", T::CodeableConcept)
                .optional("sourcePatientInfo", T::Reference)
                .many("related", T::Reference)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SchemaCache;
    use crate::schema::ShapeOptions;

    #[test]
    fn test_transcribed_list_matches_definitions() {
        for kind in TRANSCRIBED {
            assert!(is_transcribed(*kind), "{kind} listed but not defined");
        }
        let defined = ResourceKind::ALL
            .iter()
            .filter(|kind| is_transcribed(**kind))
            .count();
        assert_eq!(defined, TRANSCRIBED.len());
    }

    #[test]
    fn test_every_transcribed_kind_builds() {
        let cache = SchemaCache::new();
        for kind in TRANSCRIBED {
            let schema = cache.resource(*kind, ShapeOptions::default()).unwrap();
            let summary = schema.describe().unwrap();
            assert_eq!(summary.discriminator.as_deref(), Some(kind.as_str()));
            assert!(summary.field("id").is_some());
        }
    }

    #[test]
    fn test_resource_base_kinds_have_no_contained_slot() {
        let cache = SchemaCache::new();
        for kind in [ResourceKind::Bundle, ResourceKind::Binary, ResourceKind::Parameters] {
            let summary = cache
                .resource(kind, ShapeOptions::default())
                .unwrap()
                .describe()
                .unwrap();
            assert!(summary.field("contained").is_none(), "{kind}");
            assert!(summary.field("text").is_none(), "{kind}");
        }

        let patient = cache
            .resource(ResourceKind::Patient, ShapeOptions::default())
            .unwrap()
            .describe()
            .unwrap();
        assert_eq!(patient.field("contained").unwrap().kind, "contained Resource");
    }

    #[test]
    fn test_untranscribed_kind_is_unsupported() {
        let cache = SchemaCache::new();
        let err = cache
            .resource(ResourceKind::CarePlan, ShapeOptions::default())
            .unwrap_err();
        assert!(matches!(err, FhirShapeError::UnsupportedKind { ref kind } if kind == "CarePlan"));
        assert!(cache.is_empty());
    }
}
