//! Validation walker.
//!
//! Walks a JSON value against a published schema, dereferencing schema ids
//! through the cache as it descends. Every problem is recorded with its path;
//! nothing short-circuits except a value of the wrong JSON type, whose
//! children cannot be inspected.

use crate::cache::CacheInner;
use crate::error::{IssueKind, ValidationIssue};
use crate::path::FieldPath;
use crate::primitive::{PrimitiveFailure, json_type_name};
use crate::registry::{ResourceKind, ResourceUnion};
use crate::shape::{Cardinality, FieldKind, FieldSpec, ObjectShape, SchemaId, ShapeNode};
use serde_json::{Map, Value};

const DISCRIMINATOR: &str = "resourceType";

/// Validate `value` against schema `id`, returning every issue found
pub(crate) fn validate(cache: &CacheInner, id: SchemaId, value: &Value) -> Vec<ValidationIssue> {
    let config = cache.config();
    let mut walker = Walker {
        cache,
        max_depth: config.max_recursion_depth,
        exclusive_choices: config.enforce_choice_exclusivity,
        issues: Vec::new(),
        path: FieldPath::root(),
        depth: 0,
    };
    walker.check_schema(id, value);
    walker.issues
}

struct Walker<'a> {
    cache: &'a CacheInner,
    max_depth: usize,
    exclusive_choices: bool,
    issues: Vec<ValidationIssue>,
    path: FieldPath,
    depth: usize,
}

impl Walker<'_> {
    fn report(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.issues
            .push(ValidationIssue::new(self.path.clone(), kind, message));
    }

    fn report_at(&mut self, field: &str, kind: IssueKind, message: impl Into<String>) {
        self.issues
            .push(ValidationIssue::new(self.path.field(field), kind, message));
    }

    fn check_schema(&mut self, id: SchemaId, value: &Value) {
        let Some(entry) = self.cache.entry(id) else {
            self.report(
                IssueKind::UnresolvedSchema,
                format!("schema {id} is not published"),
            );
            return;
        };

        match &entry.node {
            ShapeNode::Object(shape) => self.check_object(shape, value),
            ShapeNode::ResourceUnion(union) => self.check_union(union, value),
            ShapeNode::Never { reason } => {
                self.report(IssueKind::ContainedForbidden, reason.clone())
            }
        }
    }

    fn check_union(&mut self, union: &ResourceUnion, value: &Value) {
        let Some(object) = value.as_object() else {
            self.report(
                IssueKind::WrongType,
                format!("expected a resource object, found {}", json_type_name(value)),
            );
            return;
        };

        let name = match object.get(DISCRIMINATOR) {
            Some(Value::String(name)) => name,
            Some(other) => {
                self.report_at(
                    DISCRIMINATOR,
                    IssueKind::WrongType,
                    format!("expected string, found {}", json_type_name(other)),
                );
                return;
            }
            None => {
                self.report_at(
                    DISCRIMINATOR,
                    IssueKind::MissingRequiredField,
                    "missing required field 'resourceType'",
                );
                return;
            }
        };

        let Ok(kind) = name.parse::<ResourceKind>() else {
            self.report_at(
                DISCRIMINATOR,
                IssueKind::UnknownKind,
                format!("'{name}' is not a known resource kind"),
            );
            return;
        };

        match union.get(kind) {
            Some(id) => self.check_schema(id, value),
            None => self.report_at(
                DISCRIMINATOR,
                IssueKind::UnsupportedKind,
                format!("resource kind '{kind}' has no shape definition"),
            ),
        }
    }

    fn check_object(&mut self, shape: &ObjectShape, value: &Value) {
        let Some(object) = value.as_object() else {
            self.report(
                IssueKind::WrongType,
                format!("expected {} object, found {}", shape.name, json_type_name(value)),
            );
            return;
        };

        if self.depth >= self.max_depth {
            self.report(
                IssueKind::RecursionLimit,
                format!("nesting exceeds the maximum depth of {}", self.max_depth),
            );
            return;
        }
        self.depth += 1;

        if let Some(expected) = &shape.discriminator {
            self.check_discriminator(expected, object);
        }

        for (key, field_value) in object {
            if key == DISCRIMINATOR && shape.is_resource() {
                continue;
            }
            if let Some(spec) = shape.field(key) {
                let shadow = object.get(&format!("_{key}"));
                self.check_field(spec, field_value, shadow);
            } else if let Some(spec) = shape.shadowed_field(key) {
                self.check_shadow(spec, field_value);
            } else {
                self.report_at(
                    key,
                    IssueKind::UnknownField,
                    format!("unknown field '{}' for {}", key, shape.name),
                );
            }
        }

        self.check_required(shape, object);
        self.check_groups(shape, object);

        self.depth -= 1;
    }

    fn check_discriminator(&mut self, expected: &str, object: &Map<String, Value>) {
        match object.get(DISCRIMINATOR) {
            Some(Value::String(found)) if found == expected => {}
            Some(Value::String(found)) => self.report_at(
                DISCRIMINATOR,
                IssueKind::InvalidLiteral,
                format!("expected '{expected}', found '{found}'"),
            ),
            Some(other) => self.report_at(
                DISCRIMINATOR,
                IssueKind::WrongType,
                format!("expected string, found {}", json_type_name(other)),
            ),
            None => self.report_at(
                DISCRIMINATOR,
                IssueKind::MissingRequiredField,
                "missing required field 'resourceType'",
            ),
        }
    }

    /// A required primitive may be carried by its `_name` sibling alone
    fn check_required(&mut self, shape: &ObjectShape, object: &Map<String, Value>) {
        for spec in shape.fields.values().filter(|spec| spec.required) {
            let present = object.contains_key(&spec.name)
                || (spec.shadow.is_some() && object.contains_key(&format!("_{}", spec.name)));
            if !present {
                self.report_at(
                    &spec.name,
                    IssueKind::MissingRequiredField,
                    format!("missing required field '{}'", spec.name),
                );
            }
        }
    }

    fn check_groups(&mut self, shape: &ObjectShape, object: &Map<String, Value>) {
        for group in &shape.groups {
            let present: Vec<&str> = group
                .members
                .iter()
                .filter(|member| {
                    object.contains_key(member.as_str())
                        || object.contains_key(&format!("_{member}"))
                })
                .map(String::as_str)
                .collect();

            if group.required && present.is_empty() {
                self.report_at(
                    &group.label(),
                    IssueKind::MissingRequiredField,
                    format!(
                        "missing required field '{}' (one of {})",
                        group.label(),
                        group.members.join(", ")
                    ),
                );
            }
            if self.exclusive_choices && present.len() > 1 {
                self.report_at(
                    &group.label(),
                    IssueKind::ChoiceConflict,
                    format!(
                        "only one of '{}' may be present, found {}",
                        group.label(),
                        present.join(", ")
                    ),
                );
            }
        }
    }

    fn check_field(&mut self, spec: &FieldSpec, value: &Value, shadow: Option<&Value>) {
        self.path.push_field(spec.name.as_str());

        match spec.cardinality {
            Cardinality::Single => {
                if value.is_array() {
                    self.report(IssueKind::WrongType, "expected a single value, found array");
                } else {
                    self.check_item(spec, value, false);
                }
            }
            Cardinality::Many => match value.as_array() {
                Some(items) => {
                    if spec.required && items.is_empty() {
                        self.report(
                            IssueKind::MissingRequiredField,
                            format!("field '{}' requires at least one item", spec.name),
                        );
                    }
                    let shadows = shadow.and_then(Value::as_array);
                    for (index, item) in items.iter().enumerate() {
                        let has_shadow = shadows
                            .and_then(|shadows| shadows.get(index))
                            .is_some_and(|shadow| !shadow.is_null());
                        self.path.push_index(index);
                        self.check_item(spec, item, has_shadow);
                        self.path.pop();
                    }
                }
                None => self.report(
                    IssueKind::WrongType,
                    format!("expected an array, found {}", json_type_name(value)),
                ),
            },
        }

        self.path.pop();
    }

    /// `null` is only accepted as an array item whose shadow carries a value
    fn check_item(&mut self, spec: &FieldSpec, item: &Value, null_allowed: bool) {
        if item.is_null() {
            if !null_allowed {
                self.report(IssueKind::WrongType, "null is not allowed here");
            }
            return;
        }

        match &spec.kind {
            FieldKind::Primitive(primitive) => {
                if let Err(failure) = primitive.check(item) {
                    let kind = match failure {
                        PrimitiveFailure::WrongType { .. } => IssueKind::WrongType,
                        PrimitiveFailure::Format { .. } => IssueKind::Format,
                    };
                    self.report(kind, failure.to_string());
                }
            }
            FieldKind::Code(codes) => match item.as_str() {
                Some(found) if codes.contains(&found) => {}
                Some(found) => self.report(
                    IssueKind::EnumMismatch,
                    format!("expected one of {}, found '{}'", codes.join(" | "), found),
                ),
                None => self.report(
                    IssueKind::WrongType,
                    format!("expected code string, found {}", json_type_name(item)),
                ),
            },
            FieldKind::Shape(id) | FieldKind::Contained(id) => self.check_schema(*id, item),
        }
    }

    fn check_shadow(&mut self, spec: &FieldSpec, value: &Value) {
        let Some(element) = spec.shadow else {
            return;
        };
        self.path.push_field(format!("_{}", spec.name));

        match (spec.cardinality, value) {
            (Cardinality::Single, Value::Array(_)) => {
                self.report(IssueKind::WrongType, "expected a single value, found array");
            }
            (Cardinality::Single, _) => self.check_schema(element, value),
            (Cardinality::Many, Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    if item.is_null() {
                        continue;
                    }
                    self.path.push_index(index);
                    self.check_schema(element, item);
                    self.path.pop();
                }
            }
            (Cardinality::Many, other) => self.report(
                IssueKind::WrongType,
                format!("expected an array, found {}", json_type_name(other)),
            ),
        }

        self.path.pop();
    }
}
