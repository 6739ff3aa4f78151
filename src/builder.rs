//! Fluent construction of closed object shapes.
//!
//! A [`ShapeBuilder`] borrows the running [`BuildContext`], so a field type
//! that names another schema is resolved (or reserved) on the spot. The first
//! error wins and is returned from [`ShapeBuilder::finish`].

use crate::cache::BuildContext;
use crate::datatypes::{self, ComplexType};
use crate::error::{FhirShapeError, Result};
use crate::primitive::PrimitiveType;
use crate::registry::{self, ResourceKind};
use crate::shape::{
    Cardinality, FieldKind, FieldSpec, ObjectShape, PolymorphicGroup, SchemaId, SchemaKey,
    ShapeNode,
};

/// Resolves a shared schema inside a running transaction
pub(crate) type Resolver = for<'c> fn(&mut BuildContext<'c>) -> Result<SchemaId>;

/// Declared type of a field
#[derive(Clone, Copy)]
pub(crate) enum Ty {
    Primitive(PrimitiveType),
    /// `code` limited to a fixed set of literals
    Code(&'static [&'static str]),
    Complex(ComplexType),
    /// Schema produced by a resolver (shared backbones, the resource union)
    Shared(Resolver),
    /// The shape under construction
    SelfRef,
}

impl Ty {
    /// Suffix of this type's member in a `name[x]` group
    fn choice_suffix(&self) -> Option<String> {
        match self {
            Ty::Primitive(primitive) => Some(primitive.choice_suffix()),
            Ty::Code(_) => Some(PrimitiveType::Code.choice_suffix()),
            Ty::Complex(complex) => Some(complex.choice_suffix().to_string()),
            Ty::Shared(_) | Ty::SelfRef => None,
        }
    }

    fn is_primitive(&self) -> bool {
        matches!(self, Ty::Primitive(_) | Ty::Code(_))
    }
}

impl From<PrimitiveType> for Ty {
    fn from(primitive: PrimitiveType) -> Self {
        Ty::Primitive(primitive)
    }
}

impl From<ComplexType> for Ty {
    fn from(complex: ComplexType) -> Self {
        Ty::Complex(complex)
    }
}

pub(crate) const BOOLEAN: Ty = Ty::Primitive(PrimitiveType::Boolean);
pub(crate) const INTEGER: Ty = Ty::Primitive(PrimitiveType::Integer);
pub(crate) const STRING: Ty = Ty::Primitive(PrimitiveType::String);
pub(crate) const DECIMAL: Ty = Ty::Primitive(PrimitiveType::Decimal);
pub(crate) const URI: Ty = Ty::Primitive(PrimitiveType::Uri);
pub(crate) const URL: Ty = Ty::Primitive(PrimitiveType::Url);
pub(crate) const CANONICAL: Ty = Ty::Primitive(PrimitiveType::Canonical);
pub(crate) const BASE64_BINARY: Ty = Ty::Primitive(PrimitiveType::Base64Binary);
pub(crate) const INSTANT: Ty = Ty::Primitive(PrimitiveType::Instant);
pub(crate) const DATE: Ty = Ty::Primitive(PrimitiveType::Date);
pub(crate) const DATE_TIME: Ty = Ty::Primitive(PrimitiveType::DateTime);
pub(crate) const TIME: Ty = Ty::Primitive(PrimitiveType::Time);
pub(crate) const CODE: Ty = Ty::Primitive(PrimitiveType::Code);
pub(crate) const OID: Ty = Ty::Primitive(PrimitiveType::Oid);
pub(crate) const ID: Ty = Ty::Primitive(PrimitiveType::Id);
pub(crate) const MARKDOWN: Ty = Ty::Primitive(PrimitiveType::Markdown);
pub(crate) const UNSIGNED_INT: Ty = Ty::Primitive(PrimitiveType::UnsignedInt);
pub(crate) const POSITIVE_INT: Ty = Ty::Primitive(PrimitiveType::PositiveInt);
pub(crate) const UUID: Ty = Ty::Primitive(PrimitiveType::Uuid);
pub(crate) const XHTML: Ty = Ty::Primitive(PrimitiveType::Xhtml);

/// Any resource, dispatched on `resourceType`
pub(crate) const RESOURCE: Ty = Ty::Shared(registry::resolve_union);

/// `code` restricted to `codes`
pub(crate) const fn code(codes: &'static [&'static str]) -> Ty {
    Ty::Code(codes)
}

pub(crate) struct ShapeBuilder<'b, 'c> {
    ctx: &'b mut BuildContext<'c>,
    self_id: SchemaId,
    shape: ObjectShape,
    element: Option<SchemaId>,
    error: Option<FhirShapeError>,
}

impl<'b, 'c> ShapeBuilder<'b, 'c> {
    /// Plain object shape registered as `self_id`
    pub fn object(ctx: &'b mut BuildContext<'c>, self_id: SchemaId, name: &str) -> Self {
        Self {
            ctx,
            self_id,
            shape: ObjectShape::new(name),
            element: None,
            error: None,
        }
    }

    /// Resource shape: `resourceType` discriminator plus the Resource fields
    pub fn resource(ctx: &'b mut BuildContext<'c>, self_id: SchemaId, kind: ResourceKind) -> Self {
        let mut builder = Self::object(ctx, self_id, kind.as_str());
        builder.shape.discriminator = Some(kind.as_str().to_string());
        builder
            .optional("id", ID)
            .optional("meta", ComplexType::Meta)
            .optional("implicitRules", URI)
            .optional("language", CODE)
    }

    /// DomainResource fields; `contained` items validate against `contained`
    pub fn domain_resource(mut self, contained: SchemaId) -> Self {
        self = self.optional("text", ComplexType::Narrative);
        if self.error.is_none() {
            self.insert(FieldSpec {
                name: "contained".to_string(),
                required: false,
                cardinality: Cardinality::Many,
                kind: FieldKind::Contained(contained),
                choice_of: None,
                shadow: None,
            });
        }
        self.many("extension", ComplexType::Extension)
            .many("modifierExtension", ComplexType::Extension)
    }

    /// Element fields: `id` and `extension`
    pub fn element_base(self) -> Self {
        self.attribute("id", STRING)
            .many("extension", ComplexType::Extension)
    }

    /// BackboneElement fields: Element plus `modifierExtension`
    pub fn backbone_base(self) -> Self {
        self.element_base()
            .many("modifierExtension", ComplexType::Extension)
    }

    pub fn optional(self, name: &str, ty: impl Into<Ty>) -> Self {
        self.push(name, false, Cardinality::Single, ty.into(), true)
    }

    pub fn required(self, name: &str, ty: impl Into<Ty>) -> Self {
        self.push(name, true, Cardinality::Single, ty.into(), true)
    }

    pub fn many(self, name: &str, ty: impl Into<Ty>) -> Self {
        self.push(name, false, Cardinality::Many, ty.into(), true)
    }

    pub fn required_many(self, name: &str, ty: impl Into<Ty>) -> Self {
        self.push(name, true, Cardinality::Many, ty.into(), true)
    }

    /// Primitive without a `_name` sibling (`Element.id`, `Extension.url`)
    pub fn attribute(self, name: &str, ty: impl Into<Ty>) -> Self {
        self.push(name, false, Cardinality::Single, ty.into(), false)
    }

    pub fn required_attribute(self, name: &str, ty: impl Into<Ty>) -> Self {
        self.push(name, true, Cardinality::Single, ty.into(), false)
    }

    /// Polymorphic `name[x]` group with one member per type
    pub fn choice(mut self, name: &str, required: bool, types: &[Ty]) -> Self {
        let mut members = Vec::with_capacity(types.len());
        for ty in types {
            let Some(suffix) = ty.choice_suffix() else {
                self.fail(format!("'{name}[x]' has a member without a type name"));
                return self;
            };
            let member = format!("{name}{suffix}");
            self = self.push_member(&member, *ty, name);
            members.push(member);
        }
        self.shape.groups.push(PolymorphicGroup {
            name: name.to_string(),
            required,
            members,
        });
        self
    }

    /// Optional single backbone element, cached under `path`
    pub fn backbone<F>(self, name: &str, path: &str, body: F) -> Self
    where
        F: for<'x> FnOnce(ShapeBuilder<'x, 'c>) -> ShapeBuilder<'x, 'c>,
    {
        self.backbone_field(name, false, Cardinality::Single, path, true, body)
    }

    pub fn required_backbone<F>(self, name: &str, path: &str, body: F) -> Self
    where
        F: for<'x> FnOnce(ShapeBuilder<'x, 'c>) -> ShapeBuilder<'x, 'c>,
    {
        self.backbone_field(name, true, Cardinality::Single, path, true, body)
    }

    pub fn backbone_many<F>(self, name: &str, path: &str, body: F) -> Self
    where
        F: for<'x> FnOnce(ShapeBuilder<'x, 'c>) -> ShapeBuilder<'x, 'c>,
    {
        self.backbone_field(name, false, Cardinality::Many, path, true, body)
    }

    pub fn required_backbone_many<F>(self, name: &str, path: &str, body: F) -> Self
    where
        F: for<'x> FnOnce(ShapeBuilder<'x, 'c>) -> ShapeBuilder<'x, 'c>,
    {
        self.backbone_field(name, true, Cardinality::Many, path, true, body)
    }

    /// Nested Element (no `modifierExtension`), such as `Timing.repeat`
    pub fn nested<F>(self, name: &str, path: &str, body: F) -> Self
    where
        F: for<'x> FnOnce(ShapeBuilder<'x, 'c>) -> ShapeBuilder<'x, 'c>,
    {
        self.backbone_field(name, false, Cardinality::Single, path, false, body)
    }

    pub fn nested_many<F>(self, name: &str, path: &str, body: F) -> Self
    where
        F: for<'x> FnOnce(ShapeBuilder<'x, 'c>) -> ShapeBuilder<'x, 'c>,
    {
        self.backbone_field(name, false, Cardinality::Many, path, false, body)
    }

    fn backbone_field<F>(
        mut self,
        name: &str,
        required: bool,
        cardinality: Cardinality,
        path: &str,
        modifiers: bool,
        body: F,
    ) -> Self
    where
        F: for<'x> FnOnce(ShapeBuilder<'x, 'c>) -> ShapeBuilder<'x, 'c>,
    {
        if self.error.is_some() {
            return self;
        }
        let resolved = self.ctx.resolve(SchemaKey::new(path), |ctx, id| {
            let base = ShapeBuilder::object(ctx, id, path);
            let base = if modifiers {
                base.backbone_base()
            } else {
                base.element_base()
            };
            body(base).finish()
        });
        match resolved {
            Ok(id) => self.insert(FieldSpec {
                name: name.to_string(),
                required,
                cardinality,
                kind: FieldKind::Shape(id),
                choice_of: None,
                shadow: None,
            }),
            Err(err) => self.error = Some(err),
        }
        self
    }

    pub fn finish(self) -> Result<ShapeNode> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(ShapeNode::Object(self.shape)),
        }
    }

    fn push(
        mut self,
        name: &str,
        required: bool,
        cardinality: Cardinality,
        ty: Ty,
        shadowed: bool,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.spec(name, required, cardinality, ty, shadowed, None) {
            Ok(spec) => self.insert(spec),
            Err(err) => self.error = Some(err),
        }
        self
    }

    fn push_member(mut self, member: &str, ty: Ty, group: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.spec(member, false, Cardinality::Single, ty, true, Some(group)) {
            Ok(spec) => self.insert(spec),
            Err(err) => self.error = Some(err),
        }
        self
    }

    fn spec(
        &mut self,
        name: &str,
        required: bool,
        cardinality: Cardinality,
        ty: Ty,
        shadowed: bool,
        group: Option<&str>,
    ) -> Result<FieldSpec> {
        let kind = match ty {
            Ty::Primitive(primitive) => FieldKind::Primitive(primitive),
            Ty::Code(codes) => FieldKind::Code(codes),
            Ty::Complex(complex) => FieldKind::Shape(datatypes::resolve(self.ctx, complex)?),
            Ty::Shared(resolver) => FieldKind::Shape(resolver(self.ctx)?),
            Ty::SelfRef => FieldKind::Shape(self.self_id),
        };
        let shadow = if shadowed && ty.is_primitive() {
            Some(self.element_id()?)
        } else {
            None
        };
        Ok(FieldSpec {
            name: name.to_string(),
            required,
            cardinality,
            kind,
            choice_of: group.map(str::to_string),
            shadow,
        })
    }

    fn element_id(&mut self) -> Result<SchemaId> {
        if let Some(id) = self.element {
            return Ok(id);
        }
        let id = datatypes::resolve(self.ctx, ComplexType::Element)?;
        self.element = Some(id);
        Ok(id)
    }

    fn insert(&mut self, spec: FieldSpec) {
        if self.shape.fields.contains_key(&spec.name) {
            let message = format!("field '{}' is declared twice", spec.name);
            self.fail(message);
            return;
        }
        self.shape.fields.insert(spec.name.clone(), spec);
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(FhirShapeError::build(self.shape.name.clone(), message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SchemaCache;

    #[test]
    fn test_choice_members_and_shadows() {
        let cache = SchemaCache::new();
        let id = cache
            .get_or_build(SchemaKey::new("Sample"), |ctx, id| {
                ShapeBuilder::object(ctx, id, "Sample")
                    .element_base()
                    .choice("value", true, &[STRING, BOOLEAN, ComplexType::Quantity.into()])
                    .many("given", STRING)
                    .finish()
            })
            .unwrap();

        let entry = cache.inner().entry(id).unwrap();
        let shape = entry.node.as_object().unwrap();

        let group = &shape.groups[0];
        assert_eq!(group.members, vec!["valueString", "valueBoolean", "valueQuantity"]);
        assert!(group.required);

        let value_string = shape.field("valueString").unwrap();
        assert_eq!(value_string.choice_of.as_deref(), Some("value"));
        assert!(!value_string.required);
        assert!(value_string.shadow.is_some());
        assert!(shape.field("valueQuantity").unwrap().shadow.is_none());

        assert!(shape.field("id").unwrap().shadow.is_none());
        assert_eq!(shape.field("given").unwrap().cardinality, Cardinality::Many);
    }

    #[test]
    fn test_duplicate_field_is_a_build_error() {
        let cache = SchemaCache::new();
        let result = cache.get_or_build(SchemaKey::new("Twice"), |ctx, id| {
            ShapeBuilder::object(ctx, id, "Twice")
                .optional("status", CODE)
                .optional("status", STRING)
                .finish()
        });
        assert!(matches!(result, Err(FhirShapeError::Build { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_backbone_is_shared_by_path() {
        let cache = SchemaCache::new();
        let id = cache
            .get_or_build(SchemaKey::new("Holder"), |ctx, id| {
                ShapeBuilder::object(ctx, id, "Holder")
                    .backbone("first", "Holder.part", |b| b.optional("label", STRING))
                    .backbone_many("second", "Holder.part", |b| b.optional("other", STRING))
                    .finish()
            })
            .unwrap();

        let entry = cache.inner().entry(id).unwrap();
        let shape = entry.node.as_object().unwrap();
        assert_eq!(
            shape.field("first").unwrap().kind,
            shape.field("second").unwrap().kind
        );
    }
}
