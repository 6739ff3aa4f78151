//! Schema handles, construction options and validated values

use crate::cache::SchemaCache;
use crate::error::{Result, ShapeError};
use crate::registry::ResourceKind;
use crate::shape::{SchemaId, SchemaKey, ShapeSummary};
use crate::validator;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Handle to a published schema.
///
/// Two handles are equal when they point at the same entry of the same cache.
#[derive(Clone)]
pub struct Schema {
    id: SchemaId,
    cache: SchemaCache,
}

impl Schema {
    pub(crate) fn new(id: SchemaId, cache: SchemaCache) -> Self {
        Self { id, cache }
    }

    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub(crate) fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Cache key this schema was published under
    pub fn key(&self) -> Option<SchemaKey> {
        self.cache.inner().entry(self.id).map(|entry| entry.key.clone())
    }

    pub fn name(&self) -> String {
        self.cache.inner().name_of(self.id)
    }

    /// Validate `value`, collecting every issue in one pass
    pub fn validate(&self, value: &Value) -> std::result::Result<Validated, ShapeError> {
        let issues = validator::validate(self.cache.inner(), self.id, value);
        if !issues.is_empty() {
            return Err(ShapeError::new(self.name(), issues));
        }

        let kind = value
            .get("resourceType")
            .and_then(Value::as_str)
            .and_then(|name| name.parse::<ResourceKind>().ok());
        Ok(Validated {
            kind,
            value: value.clone(),
        })
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        validator::validate(self.cache.inner(), self.id, value).is_empty()
    }

    /// Field table of an object schema; `None` for unions and `Never`
    pub fn describe(&self) -> Option<ShapeSummary> {
        let inner = self.cache.inner();
        let entry = inner.entry(self.id)?;
        let shape = entry.node.as_object()?;
        Some(ShapeSummary::from_shape(shape, |id| inner.name_of(id)))
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.cache.same_cache(&other.cache)
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

/// How a resource schema treats its `contained` slot
#[derive(Debug, Clone)]
pub struct ShapeOptions {
    contained: Option<Schema>,
    allow_contained: bool,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            contained: None,
            allow_contained: true,
        }
    }
}

impl ShapeOptions {
    /// Contained resources validate against the any-resource union
    pub fn new() -> Self {
        Self::default()
    }

    /// Any contained resource fails; `contained: []` still passes
    pub fn forbid_contained() -> Self {
        Self {
            contained: None,
            allow_contained: false,
        }
    }

    /// Contained resources validate against `schema`
    pub fn with_contained(schema: Schema) -> Self {
        Self {
            contained: Some(schema),
            allow_contained: true,
        }
    }

    pub fn allow_contained(mut self, allow: bool) -> Self {
        self.allow_contained = allow;
        self
    }

    pub fn allows_contained(&self) -> bool {
        self.allow_contained
    }

    pub fn contained(&self) -> Option<&Schema> {
        self.contained.as_ref()
    }
}

/// A value that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    kind: Option<ResourceKind>,
    value: Value,
}

impl Validated {
    /// Resource kind named by `resourceType`, for resource documents
    pub fn kind(&self) -> Option<ResourceKind> {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Deserialize into a caller-defined model
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.value)?)
    }
}
