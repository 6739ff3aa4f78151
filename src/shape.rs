//! Shape model: what a constructed schema looks like once published.
//!
//! Shapes never hold other shapes directly. Nested types are referenced by
//! [`SchemaId`], so a shape can point at itself or at a shape that is still
//! being built in the same cache transaction.

use crate::primitive::PrimitiveType;
use crate::registry::ResourceUnion;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Arena index of a schema inside one [`SchemaCache`](crate::SchemaCache)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SchemaId(u32);

impl SchemaId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cache key: a shape name plus the ids of the schemas it is parameterized over
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SchemaKey {
    pub name: String,
    pub params: Vec<SchemaId>,
}

impl SchemaKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: Vec<SchemaId>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(SchemaId::to_string).collect();
            write!(f, "<{}>", params.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// At most one value
    Single,
    /// JSON array of values
    Many,
}

/// What a field's value (or each array item) must be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Primitive(PrimitiveType),
    /// `code` restricted to a fixed set of literals
    Code(&'static [&'static str]),
    /// Nested complex type or backbone element
    Shape(SchemaId),
    /// The `contained` slot; the id is the caller-chosen element schema
    Contained(SchemaId),
}

impl FieldKind {
    pub fn schema(&self) -> Option<SchemaId> {
        match self {
            FieldKind::Shape(id) | FieldKind::Contained(id) => Some(*id),
            FieldKind::Primitive(_) | FieldKind::Code(_) => None,
        }
    }
}

/// One declared property of an object shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub required: bool,
    pub cardinality: Cardinality,
    pub kind: FieldKind,
    /// Logical group name when the field is one member of `name[x]`
    pub choice_of: Option<String>,
    /// Element schema accepted under `_name`, for primitive fields
    pub shadow: Option<SchemaId>,
}

impl FieldSpec {
    /// FHIR-style cardinality label (`0..1`, `1..*`, ...)
    pub fn cardinality_label(&self) -> &'static str {
        match (self.required, self.cardinality) {
            (false, Cardinality::Single) => "0..1",
            (true, Cardinality::Single) => "1..1",
            (false, Cardinality::Many) => "0..*",
            (true, Cardinality::Many) => "1..*",
        }
    }
}

/// A polymorphic `name[x]` group and its type-suffixed members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolymorphicGroup {
    pub name: String,
    pub required: bool,
    pub members: Vec<String>,
}

impl PolymorphicGroup {
    /// Rendered logical name, used as the path of group-level issues
    pub fn label(&self) -> String {
        format!("{}[x]", self.name)
    }
}

/// A closed object shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectShape {
    pub name: String,
    /// Required literal for `resourceType`, set on resource shapes only
    pub discriminator: Option<String>,
    pub fields: IndexMap<String, FieldSpec>,
    pub groups: Vec<PolymorphicGroup>,
}

impl ObjectShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            discriminator: None,
            fields: IndexMap::new(),
            groups: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Resolve a `_name` key to the primitive field it shadows
    pub fn shadowed_field(&self, key: &str) -> Option<&FieldSpec> {
        let name = key.strip_prefix('_')?;
        self.fields.get(name).filter(|spec| spec.shadow.is_some())
    }

    pub fn is_resource(&self) -> bool {
        self.discriminator.is_some()
    }
}

/// A published schema body
#[derive(Debug, Clone)]
pub enum ShapeNode {
    Object(ObjectShape),
    /// Dispatch on `resourceType` over every known kind
    ResourceUnion(ResourceUnion),
    /// Rejects every value
    Never { reason: String },
}

impl ShapeNode {
    pub fn as_object(&self) -> Option<&ObjectShape> {
        match self {
            ShapeNode::Object(shape) => Some(shape),
            _ => None,
        }
    }
}

/// Tooling view of an object shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    pub fields: Vec<FieldSummary>,
    pub groups: Vec<PolymorphicGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub name: String,
    pub cardinality: &'static str,
    /// Type name, or the allowed codes for fixed enumerations
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_of: Option<String>,
    pub shadow: bool,
}

impl ShapeSummary {
    /// Summarize `shape`, naming referenced schemas through `name_of`
    pub fn from_shape(shape: &ObjectShape, name_of: impl Fn(SchemaId) -> String) -> Self {
        let fields = shape
            .fields
            .values()
            .map(|spec| FieldSummary {
                name: spec.name.clone(),
                cardinality: spec.cardinality_label(),
                kind: match &spec.kind {
                    FieldKind::Primitive(primitive) => primitive.to_string(),
                    FieldKind::Code(codes) => format!("code {{{}}}", codes.join(" | ")),
                    FieldKind::Shape(id) => name_of(*id),
                    FieldKind::Contained(id) => format!("contained {}", name_of(*id)),
                },
                choice_of: spec.choice_of.clone(),
                shadow: spec.shadow.is_some(),
            })
            .collect();

        Self {
            name: shape.name.clone(),
            discriminator: shape.discriminator.clone(),
            fields,
            groups: shape.groups.clone(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSummary> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_shape() -> ObjectShape {
        let mut shape = ObjectShape::new("Sample");
        shape.fields.insert(
            "status".to_string(),
            FieldSpec {
                name: "status".to_string(),
                required: true,
                cardinality: Cardinality::Single,
                kind: FieldKind::Code(&["active", "inactive"]),
                choice_of: None,
                shadow: Some(SchemaId::new(0)),
            },
        );
        shape.fields.insert(
            "note".to_string(),
            FieldSpec {
                name: "note".to_string(),
                required: false,
                cardinality: Cardinality::Many,
                kind: FieldKind::Shape(SchemaId::new(7)),
                choice_of: None,
                shadow: None,
            },
        );
        shape
    }

    #[test]
    fn test_key_display() {
        assert_eq!(SchemaKey::new("Patient").to_string(), "Patient");
        let key = SchemaKey::with_params("Patient", vec![SchemaId::new(3)]);
        assert_eq!(key.to_string(), "Patient<#3>");
        assert_ne!(key, SchemaKey::new("Patient"));
    }

    #[test]
    fn test_shadow_lookup() {
        let shape = sample_shape();
        assert_eq!(shape.shadowed_field("_status").map(|f| f.name.as_str()), Some("status"));
        assert!(shape.shadowed_field("_note").is_none());
        assert!(shape.shadowed_field("status").is_none());
    }

    #[test]
    fn test_summary() {
        let summary =
            ShapeSummary::from_shape(&sample_shape(), |id| format!("Type{}", id.as_u32()));
        let status = summary.field("status").unwrap();
        assert_eq!(status.cardinality, "1..1");
        assert_eq!(status.kind, "code {active | inactive}");
        assert!(status.shadow);

        let note = summary.field("note").unwrap();
        assert_eq!(note.cardinality, "0..*");
        assert_eq!(note.kind, "Type7");
    }
}
