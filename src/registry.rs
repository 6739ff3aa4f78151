//! Resource-kind registry and the any-resource union
//!
//! [`ResourceKind`] is the closed set of FHIR R4 resource names. The union
//! schema maps every kind that has a shape definition to that kind's default
//! schema; its own id is the contained parameter of those schemas, which is
//! what lets a resource contain resources of its own kind.

use crate::cache::BuildContext;
use crate::error::Result;
use crate::resources;
use crate::shape::{SchemaId, SchemaKey, ShapeNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Cache key of the any-resource union
pub const UNION_KEY: &str = "Resource";

/// Cache key of the always-failing schema used to forbid contained resources
pub const NEVER_KEY: &str = "Never";

macro_rules! resource_kinds {
    ($($kind:ident),+ $(,)?) => {
        /// FHIR R4 resource kinds
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum ResourceKind {
            $($kind),+
        }

        impl ResourceKind {
            /// Every R4 resource kind, in alphabetical order
            pub const ALL: &'static [ResourceKind] = &[$(ResourceKind::$kind),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ResourceKind::$kind => stringify!($kind)),+
                }
            }
        }

        impl FromStr for ResourceKind {
            type Err = UnknownResourceKind;

            fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
                match name {
                    $(stringify!($kind) => Ok(ResourceKind::$kind),)+
                    _ => Err(UnknownResourceKind(name.to_string())),
                }
            }
        }
    };
}

resource_kinds! {
    Account,
    ActivityDefinition,
    AdverseEvent,
    AllergyIntolerance,
    Appointment,
    AppointmentResponse,
    AuditEvent,
    Basic,
    Binary,
    BiologicallyDerivedProduct,
    BodyStructure,
    Bundle,
    CapabilityStatement,
    CarePlan,
    CareTeam,
    CatalogEntry,
    ChargeItem,
    ChargeItemDefinition,
    Claim,
    ClaimResponse,
    ClinicalImpression,
    CodeSystem,
    Communication,
    CommunicationRequest,
    CompartmentDefinition,
    Composition,
    ConceptMap,
    Condition,
    Consent,
    Contract,
    Coverage,
    CoverageEligibilityRequest,
    CoverageEligibilityResponse,
    DetectedIssue,
    Device,
    DeviceDefinition,
    DeviceMetric,
    DeviceRequest,
    DeviceUseStatement,
    DiagnosticReport,
    DocumentManifest,
    DocumentReference,
    EffectEvidenceSynthesis,
    Encounter,
    Endpoint,
    EnrollmentRequest,
    EnrollmentResponse,
    EpisodeOfCare,
    EventDefinition,
    Evidence,
    EvidenceVariable,
    ExampleScenario,
    ExplanationOfBenefit,
    FamilyMemberHistory,
    Flag,
    Goal,
    GraphDefinition,
    Group,
    GuidanceResponse,
    HealthcareService,
    ImagingStudy,
    Immunization,
    ImmunizationEvaluation,
    ImmunizationRecommendation,
    ImplementationGuide,
    InsurancePlan,
    Invoice,
    Library,
    Linkage,
    List,
    Location,
    Measure,
    MeasureReport,
    Media,
    Medication,
    MedicationAdministration,
    MedicationDispense,
    MedicationKnowledge,
    MedicationRequest,
    MedicationStatement,
    MedicinalProduct,
    MedicinalProductAuthorization,
    MedicinalProductContraindication,
    MedicinalProductIndication,
    MedicinalProductIngredient,
    MedicinalProductInteraction,
    MedicinalProductManufactured,
    MedicinalProductPackaged,
    MedicinalProductPharmaceutical,
    MedicinalProductUndesirableEffect,
    MessageDefinition,
    MessageHeader,
    MolecularSequence,
    NamingSystem,
    NutritionOrder,
    Observation,
    ObservationDefinition,
    OperationDefinition,
    OperationOutcome,
    Organization,
    OrganizationAffiliation,
    Parameters,
    Patient,
    PaymentNotice,
    PaymentReconciliation,
    Person,
    PlanDefinition,
    Practitioner,
    PractitionerRole,
    Procedure,
    Provenance,
    Questionnaire,
    QuestionnaireResponse,
    RelatedPerson,
    RequestGroup,
    ResearchDefinition,
    ResearchElementDefinition,
    ResearchStudy,
    ResearchSubject,
    RiskAssessment,
    RiskEvidenceSynthesis,
    Schedule,
    SearchParameter,
    ServiceRequest,
    Slot,
    Specimen,
    SpecimenDefinition,
    StructureDefinition,
    StructureMap,
    Subscription,
    Substance,
    SubstanceNucleicAcid,
    SubstancePolymer,
    SubstanceProtein,
    SubstanceReferenceInformation,
    SubstanceSourceMaterial,
    SubstanceSpecification,
    SupplyDelivery,
    SupplyRequest,
    Task,
    TerminologyCapabilities,
    TestReport,
    TestScript,
    ValueSet,
    VerificationResult,
    VisionPrescription,
}

impl ResourceKind {
    /// Whether `name` is an R4 resource kind (exact, case-sensitive)
    pub fn is_known(name: &str) -> bool {
        name.parse::<ResourceKind>().is_ok()
    }

    /// Whether this kind has a shape definition
    pub fn is_supported(&self) -> bool {
        resources::is_transcribed(*self)
    }

    /// Kinds with a shape definition
    pub fn supported() -> impl Iterator<Item = ResourceKind> {
        resources::TRANSCRIBED.iter().copied()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown resource kind '{0}'")]
pub struct UnknownResourceKind(pub String);

/// Body of the union schema: kind to default schema id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUnion {
    members: BTreeMap<ResourceKind, SchemaId>,
}

impl ResourceUnion {
    pub fn new(members: BTreeMap<ResourceKind, SchemaId>) -> Self {
        Self { members }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<SchemaId> {
        self.members.get(&kind).copied()
    }
}

/// Id of the any-resource union, building every supported kind on first use
pub(crate) fn resolve_union(ctx: &mut BuildContext<'_>) -> Result<SchemaId> {
    ctx.resolve(SchemaKey::new(UNION_KEY), |ctx, union_id| {
        let mut members = BTreeMap::new();
        for kind in resources::TRANSCRIBED {
            let id = resources::resolve(ctx, *kind, union_id)?;
            members.insert(*kind, id);
        }
        Ok(ShapeNode::ResourceUnion(ResourceUnion::new(members)))
    })
}

pub(crate) fn resolve_never(ctx: &mut BuildContext<'_>) -> Result<SchemaId> {
    ctx.resolve(SchemaKey::new(NEVER_KEY), |_, _| {
        Ok(ShapeNode::Never {
            reason: "contained resources are not allowed here".to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_kinds_round_trip() {
        assert_eq!(ResourceKind::ALL.len(), 146);
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>(), Ok(*kind));
        }
    }

    #[test]
    fn test_lookup_is_exact() {
        assert!(ResourceKind::is_known("Patient"));
        assert!(ResourceKind::is_known("VisionPrescription"));
        assert!(!ResourceKind::is_known("patient"));
        assert!(!ResourceKind::is_known("NotAKind"));
        assert!(!ResourceKind::is_known(""));

        let err = "Patients".parse::<ResourceKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown resource kind 'Patients'");
    }

    #[test]
    fn test_supported_kinds() {
        assert!(ResourceKind::Patient.is_supported());
        assert!(ResourceKind::Bundle.is_supported());
        assert!(!ResourceKind::VisionPrescription.is_supported());
        assert!(ResourceKind::supported().all(|kind| kind.is_supported()));
    }

    #[test]
    fn test_serde_uses_kind_name() {
        let json = serde_json::to_value(ResourceKind::AuditEvent).unwrap();
        assert_eq!(json, serde_json::json!("AuditEvent"));
        let kind: ResourceKind = serde_json::from_value(serde_json::json!("Bundle")).unwrap();
        assert_eq!(kind, ResourceKind::Bundle);
    }
}
