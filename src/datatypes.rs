//! Shared FHIR R4 complex datatypes.
//!
//! Every datatype is cached under its own name with no parameters.
//! Self-references (`Extension.extension`, `Identifier.assigner` ->
//! `Reference.identifier`) resolve to reserved ids while the type is built.

use crate::builder::{
    BASE64_BINARY, BOOLEAN, CANONICAL, CODE, DATE, DATE_TIME, DECIMAL, ID, INSTANT, INTEGER,
    MARKDOWN, OID, POSITIVE_INT, STRING, ShapeBuilder, TIME, Ty, UNSIGNED_INT, URI, URL, UUID,
    XHTML, code,
};
use crate::cache::BuildContext;
use crate::error::Result;
use crate::shape::{SchemaId, SchemaKey, ShapeNode};
use std::fmt;
use std::str::FromStr;

/// Shared complex datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComplexType {
    Element,
    Extension,
    Meta,
    Narrative,
    Coding,
    CodeableConcept,
    Identifier,
    Reference,
    Period,
    Quantity,
    SimpleQuantity,
    Duration,
    Age,
    Distance,
    Count,
    Money,
    Range,
    Ratio,
    Annotation,
    Attachment,
    Signature,
    Timing,
    HumanName,
    Address,
    ContactPoint,
    SampledData,
    ContactDetail,
    Contributor,
    DataRequirement,
    Expression,
    ParameterDefinition,
    RelatedArtifact,
    TriggerDefinition,
    UsageContext,
    Dosage,
}

impl ComplexType {
    pub const ALL: &'static [ComplexType] = &[
        ComplexType::Element,
        ComplexType::Extension,
        ComplexType::Meta,
        ComplexType::Narrative,
        ComplexType::Coding,
        ComplexType::CodeableConcept,
        ComplexType::Identifier,
        ComplexType::Reference,
        ComplexType::Period,
        ComplexType::Quantity,
        ComplexType::SimpleQuantity,
        ComplexType::Duration,
        ComplexType::Age,
        ComplexType::Distance,
        ComplexType::Count,
        ComplexType::Money,
        ComplexType::Range,
        ComplexType::Ratio,
        ComplexType::Annotation,
        ComplexType::Attachment,
        ComplexType::Signature,
        ComplexType::Timing,
        ComplexType::HumanName,
        ComplexType::Address,
        ComplexType::ContactPoint,
        ComplexType::SampledData,
        ComplexType::ContactDetail,
        ComplexType::Contributor,
        ComplexType::DataRequirement,
        ComplexType::Expression,
        ComplexType::ParameterDefinition,
        ComplexType::RelatedArtifact,
        ComplexType::TriggerDefinition,
        ComplexType::UsageContext,
        ComplexType::Dosage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexType::Element => "Element",
            ComplexType::Extension => "Extension",
            ComplexType::Meta => "Meta",
            ComplexType::Narrative => "Narrative",
            ComplexType::Coding => "Coding",
            ComplexType::CodeableConcept => "CodeableConcept",
            ComplexType::Identifier => "Identifier",
            ComplexType::Reference => "Reference",
            ComplexType::Period => "Period",
            ComplexType::Quantity => "Quantity",
            ComplexType::SimpleQuantity => "SimpleQuantity",
            ComplexType::Duration => "Duration",
            ComplexType::Age => "Age",
            ComplexType::Distance => "Distance",
            ComplexType::Count => "Count",
            ComplexType::Money => "Money",
            ComplexType::Range => "Range",
            ComplexType::Ratio => "Ratio",
            ComplexType::Annotation => "Annotation",
            ComplexType::Attachment => "Attachment",
            ComplexType::Signature => "Signature",
            ComplexType::Timing => "Timing",
            ComplexType::HumanName => "HumanName",
            ComplexType::Address => "Address",
            ComplexType::ContactPoint => "ContactPoint",
            ComplexType::SampledData => "SampledData",
            ComplexType::ContactDetail => "ContactDetail",
            ComplexType::Contributor => "Contributor",
            ComplexType::DataRequirement => "DataRequirement",
            ComplexType::Expression => "Expression",
            ComplexType::ParameterDefinition => "ParameterDefinition",
            ComplexType::RelatedArtifact => "RelatedArtifact",
            ComplexType::TriggerDefinition => "TriggerDefinition",
            ComplexType::UsageContext => "UsageContext",
            ComplexType::Dosage => "Dosage",
        }
    }

    /// Suffix used in `name[x]` members; SimpleQuantity is a Quantity profile
    pub fn choice_suffix(&self) -> &'static str {
        match self {
            ComplexType::SimpleQuantity => "Quantity",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ComplexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexType {
    type Err = String;

    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == name)
            .ok_or_else(|| format!("Unknown complex type '{name}'"))
    }
}

use ComplexType as T;

/// Types allowed in open `value[x]` slots (Extension, Parameters)
pub(crate) const OPEN_TYPES: &[Ty] = &[
    BASE64_BINARY,
    BOOLEAN,
    CANONICAL,
    CODE,
    DATE,
    DATE_TIME,
    DECIMAL,
    ID,
    INSTANT,
    INTEGER,
    MARKDOWN,
    OID,
    POSITIVE_INT,
    STRING,
    TIME,
    UNSIGNED_INT,
    URI,
    URL,
    UUID,
    Ty::Complex(T::Address),
    Ty::Complex(T::Age),
    Ty::Complex(T::Annotation),
    Ty::Complex(T::Attachment),
    Ty::Complex(T::CodeableConcept),
    Ty::Complex(T::Coding),
    Ty::Complex(T::ContactPoint),
    Ty::Complex(T::Count),
    Ty::Complex(T::Distance),
    Ty::Complex(T::Duration),
    Ty::Complex(T::HumanName),
    Ty::Complex(T::Identifier),
    Ty::Complex(T::Money),
    Ty::Complex(T::Period),
    Ty::Complex(T::Quantity),
    Ty::Complex(T::Range),
    Ty::Complex(T::Ratio),
    Ty::Complex(T::Reference),
    Ty::Complex(T::SampledData),
    Ty::Complex(T::Signature),
    Ty::Complex(T::Timing),
    Ty::Complex(T::ContactDetail),
    Ty::Complex(T::Contributor),
    Ty::Complex(T::DataRequirement),
    Ty::Complex(T::Expression),
    Ty::Complex(T::ParameterDefinition),
    Ty::Complex(T::RelatedArtifact),
    Ty::Complex(T::TriggerDefinition),
    Ty::Complex(T::UsageContext),
    Ty::Complex(T::Dosage),
    Ty::Complex(T::Meta),
];

const QUANTITY_COMPARATOR: &[&str] = &["<", "<=", ">=", ">"];

const UNITS_OF_TIME: &[&str] = &["s", "min", "h", "d", "wk", "mo", "a"];

pub(crate) const DAYS_OF_WEEK: &[&str] = &["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

const EVENT_TIMING: &[&str] = &[
    "MORN", "MORN.early", "MORN.late", "NOON", "AFT", "AFT.early", "AFT.late", "EVE",
    "EVE.early", "EVE.late", "NIGHT", "PHS", "HS", "WAKE", "C", "CM", "CD", "CV", "AC", "ACM",
    "ACD", "ACV", "PC", "PCM", "PCD", "PCV",
];

/// Id of `datatype`, building it on first use
pub(crate) fn resolve(ctx: &mut BuildContext<'_>, datatype: ComplexType) -> Result<SchemaId> {
    ctx.resolve(SchemaKey::new(datatype.as_str()), |ctx, id| {
        build(ShapeBuilder::object(ctx, id, datatype.as_str()), datatype)
    })
}

fn build(b: ShapeBuilder<'_, '_>, datatype: ComplexType) -> Result<ShapeNode> {
    let b = match datatype {
        T::Element => b.element_base(),
        T::Extension => b
            .element_base()
            .required_attribute("url", URI)
            .choice("value", false, OPEN_TYPES),
        T::Meta => b
            .element_base()
            .optional("versionId", ID)
            .optional("lastUpdated", INSTANT)
            .optional("source", URI)
            .many("profile", CANONICAL)
            .many("security", T::Coding)
            .many("tag", T::Coding),
        T::Narrative => b
            .element_base()
            .required(
                "status",
                code(&["generated", "extensions", "additional", "empty"]),
            )
            .required("div", XHTML),
        T::Coding => b
            .element_base()
            .optional("system", URI)
            .optional("version", STRING)
            .optional("code", CODE)
            .optional("display", STRING)
            .optional("userSelected", BOOLEAN),
        T::CodeableConcept => b
            .element_base()
            .many("coding", T::Coding)
            .optional("text", STRING),
        T::Identifier => b
            .element_base()
            .optional(
                "use",
                code(&["usual", "official", "temp", "secondary", "old"]),
            )
            .optional("type", T::CodeableConcept)
            .optional("system", URI)
            .optional("value", STRING)
            .optional("period", T::Period)
            .optional("assigner", T::Reference),
        T::Reference => b
            .element_base()
            .optional("reference", STRING)
            .optional("type", URI)
            .optional("identifier", T::Identifier)
            .optional("display", STRING),
        T::Period => b
            .element_base()
            .optional("start", DATE_TIME)
            .optional("end", DATE_TIME),
        T::Quantity | T::Duration | T::Age | T::Distance | T::Count => b
            .element_base()
            .optional("value", DECIMAL)
            .optional("comparator", code(QUANTITY_COMPARATOR))
            .optional("unit", STRING)
            .optional("system", URI)
            .optional("code", CODE),
        T::SimpleQuantity => b
            .element_base()
            .optional("value", DECIMAL)
            .optional("unit", STRING)
            .optional("system", URI)
            .optional("code", CODE),
        T::Money => b
            .element_base()
            .optional("value", DECIMAL)
            .optional("currency", CODE),
        T::Range => b
            .element_base()
            .optional("low", T::SimpleQuantity)
            .optional("high", T::SimpleQuantity),
        T::Ratio => b
            .element_base()
            .optional("numerator", T::Quantity)
            .optional("denominator", T::Quantity),
        T::Annotation => b
            .element_base()
            .choice("author", false, &[Ty::Complex(T::Reference), STRING])
            .optional("time", DATE_TIME)
            .required("text", MARKDOWN),
        T::Attachment => b
            .element_base()
            .optional("contentType", CODE)
            .optional("language", CODE)
            .optional("data", BASE64_BINARY)
            .optional("url", URL)
            .optional("size", UNSIGNED_INT)
            .optional("hash", BASE64_BINARY)
            .optional("title", STRING)
            .optional("creation", DATE_TIME),
        T::Signature => b
            .element_base()
            .required_many("type", T::Coding)
            .required("when", INSTANT)
            .required("who", T::Reference)
            .optional("onBehalfOf", T::Reference)
            .optional("targetFormat", CODE)
            .optional("sigFormat", CODE)
            .optional("data", BASE64_BINARY),
        T::Timing => b
            .backbone_base()
            .many("event", DATE_TIME)
            .nested("repeat", "Timing.repeat", |r| {
                r.choice(
                    "bounds",
                    false,
                    &[
                        Ty::Complex(T::Duration),
                        Ty::Complex(T::Range),
                        Ty::Complex(T::Period),
                    ],
                )
                .optional("count", POSITIVE_INT)
                .optional("countMax", POSITIVE_INT)
                .optional("duration", DECIMAL)
                .optional("durationMax", DECIMAL)
                .optional("durationUnit", code(UNITS_OF_TIME))
                .optional("frequency", POSITIVE_INT)
                .optional("frequencyMax", POSITIVE_INT)
                .optional("period", DECIMAL)
                .optional("periodMax", DECIMAL)
                .optional("periodUnit", code(UNITS_OF_TIME))
                .many("dayOfWeek", code(DAYS_OF_WEEK))
                .many("timeOfDay", TIME)
                .many("when", code(EVENT_TIMING))
                .optional("offset", UNSIGNED_INT)
            })
            .optional("code", T::CodeableConcept),
        T::HumanName => b
            .element_base()
            .optional(
                "use",
                code(&[
                    "usual", "official", "temp", "nickname", "anonymous", "old", "maiden",
                ]),
            )
            .optional("text", STRING)
            .optional("family", STRING)
            .many("given", STRING)
            .many("prefix", STRING)
            .many("suffix", STRING)
            .optional("period", T::Period),
        T::Address => b
            .element_base()
            .optional("use", code(&["home", "work", "temp", "old", "billing"]))
            .optional("type", code(&["postal", "physical", "both"]))
            .optional("text", STRING)
            .many("line", STRING)
            .optional("city", STRING)
            .optional("district", STRING)
            .optional("state", STRING)
            .optional("postalCode", STRING)
            .optional("country", STRING)
            .optional("period", T::Period),
        T::ContactPoint => b
            .element_base()
            .optional(
                "system",
                code(&["phone", "fax", "email", "pager", "url", "sms", "other"]),
            )
            .optional("value", STRING)
            .optional("use", code(&["home", "work", "temp", "old", "mobile"]))
            .optional("rank", POSITIVE_INT)
            .optional("period", T::Period),
        T::SampledData => b
            .element_base()
            .required("origin", T::SimpleQuantity)
            .required("period", DECIMAL)
            .optional("factor", DECIMAL)
            .optional("lowerLimit", DECIMAL)
            .optional("upperLimit", DECIMAL)
            .required("dimensions", POSITIVE_INT)
            .optional("data", STRING),
        T::ContactDetail => b
            .element_base()
            .optional("name", STRING)
            .many("telecom", T::ContactPoint),
        T::Contributor => b
            .element_base()
            .required("type", code(&["author", "editor", "reviewer", "endorser"]))
            .required("name", STRING)
            .many("contact", T::ContactDetail),
        T::DataRequirement => b
            .element_base()
            .required("type", CODE)
            .many("profile", CANONICAL)
            .choice(
                "subject",
                false,
                &[Ty::Complex(T::CodeableConcept), Ty::Complex(T::Reference)],
            )
            .many("mustSupport", STRING)
            .nested_many("codeFilter", "DataRequirement.codeFilter", |f| {
                f.optional("path", STRING)
                    .optional("searchParam", STRING)
                    .optional("valueSet", CANONICAL)
                    .many("code", T::Coding)
            })
            .nested_many("dateFilter", "DataRequirement.dateFilter", |f| {
                f.optional("path", STRING)
                    .optional("searchParam", STRING)
                    .choice(
                        "value",
                        false,
                        &[
                            DATE_TIME,
                            Ty::Complex(T::Period),
                            Ty::Complex(T::Duration),
                        ],
                    )
            })
            .optional("limit", POSITIVE_INT)
            .nested_many("sort", "DataRequirement.sort", |s| {
                s.required("path", STRING)
                    .required("direction", code(&["ascending", "descending"]))
            }),
        T::Expression => b
            .element_base()
            .optional("description", STRING)
            .optional("name", ID)
            .required("language", CODE)
            .optional("expression", STRING)
            .optional("reference", URI),
        T::ParameterDefinition => b
            .element_base()
            .optional("name", CODE)
            .required("use", code(&["in", "out"]))
            .optional("min", INTEGER)
            .optional("max", STRING)
            .optional("documentation", STRING)
            .required("type", CODE)
            .optional("profile", CANONICAL),
        T::RelatedArtifact => b
            .element_base()
            .required(
                "type",
                code(&[
                    "documentation",
                    "justification",
                    "citation",
                    "predecessor",
                    "successor",
                    "derived-from",
                    "depends-on",
                    "composed-of",
                ]),
            )
            .optional("label", STRING)
            .optional("display", STRING)
            .optional("citation", MARKDOWN)
            .optional("url", URL)
            .optional("document", T::Attachment)
            .optional("resource", CANONICAL),
        T::TriggerDefinition => b
            .element_base()
            .required(
                "type",
                code(&[
                    "named-event",
                    "periodic",
                    "data-changed",
                    "data-added",
                    "data-modified",
                    "data-removed",
                    "data-accessed",
                    "data-access-ended",
                ]),
            )
            .optional("name", STRING)
            .choice(
                "timing",
                false,
                &[
                    Ty::Complex(T::Timing),
                    Ty::Complex(T::Reference),
                    DATE,
                    DATE_TIME,
                ],
            )
            .many("data", T::DataRequirement)
            .optional("condition", T::Expression),
        T::UsageContext => b
            .element_base()
            .required("code", T::Coding)
            .choice(
                "value",
                true,
                &[
                    Ty::Complex(T::CodeableConcept),
                    Ty::Complex(T::Quantity),
                    Ty::Complex(T::Range),
                    Ty::Complex(T::Reference),
                ],
            ),
        T::Dosage => b
            .backbone_base()
            .optional("sequence", INTEGER)
            .optional("text", STRING)
            .many("additionalInstruction", T::CodeableConcept)
            .optional("patientInstruction", STRING)
            .optional("timing", T::Timing)
            .choice(
                "asNeeded",
                false,
                &[BOOLEAN, Ty::Complex(T::CodeableConcept)],
            )
            .optional("site", T::CodeableConcept)
            .optional("route", T::CodeableConcept)
            .optional("method", T::CodeableConcept)
            .nested_many("doseAndRate", "Dosage.doseAndRate", |d| {
                d.optional("type", T::CodeableConcept)
                    .choice(
                        "dose",
                        false,
                        &[Ty::Complex(T::Range), Ty::Complex(T::SimpleQuantity)],
                    )
                    .choice(
                        "rate",
                        false,
                        &[
                            Ty::Complex(T::Ratio),
                            Ty::Complex(T::Range),
                            Ty::Complex(T::SimpleQuantity),
                        ],
                    )
            })
            .optional("maxDosePerPeriod", T::Ratio)
            .optional("maxDosePerAdministration", T::SimpleQuantity)
            .optional("maxDosePerLifetime", T::SimpleQuantity),
    };
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SchemaCache;
    use crate::shape::FieldKind;

    #[test]
    fn test_name_round_trip() {
        for ty in ComplexType::ALL {
            assert_eq!(ty.as_str().parse::<ComplexType>(), Ok(*ty));
        }
        assert!("Patient".parse::<ComplexType>().is_err());
    }

    #[test]
    fn test_extension_references_itself() {
        let cache = SchemaCache::new();
        let extension = cache.datatype(ComplexType::Extension).unwrap();
        let summary = extension.describe().unwrap();

        let nested = summary.field("extension").unwrap();
        assert_eq!(nested.kind, "Extension");
        assert_eq!(nested.cardinality, "0..*");
        assert_eq!(summary.field("url").unwrap().cardinality, "1..1");
        assert!(summary.field("valueString").is_some());
        assert!(summary.field("valueDosage").is_some());
    }

    #[test]
    fn test_identifier_reference_cycle() {
        let cache = SchemaCache::new();
        let identifier = cache.datatype(ComplexType::Identifier).unwrap();
        let reference = cache.datatype(ComplexType::Reference).unwrap();

        let entry = cache.inner().entry(reference.id()).unwrap();
        let shape = entry.node.as_object().unwrap();
        assert_eq!(
            shape.field("identifier").unwrap().kind,
            FieldKind::Shape(identifier.id())
        );
    }

    #[test]
    fn test_simple_quantity_member_name() {
        let cache = SchemaCache::new();
        let dosage = cache.datatype(ComplexType::Dosage).unwrap();
        let entry = cache.inner().entry(dosage.id()).unwrap();
        let dose_and_rate = entry
            .node
            .as_object()
            .unwrap()
            .field("doseAndRate")
            .unwrap()
            .kind
            .schema()
            .unwrap();
        let nested = cache.inner().entry(dose_and_rate).unwrap();
        let shape = nested.node.as_object().unwrap();
        assert!(shape.field("doseQuantity").is_some());
        assert!(shape.field("rateRatio").is_some());
        assert!(shape.field("modifierExtension").is_none());
    }
}
