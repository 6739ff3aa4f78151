//! Error types for schema construction and validation
//!
//! Two layers are kept apart:
//! - [`FhirShapeError`]: programming and environment errors raised by the engine
//!   itself (unsupported kind, schema from another cache, config I/O).
//! - [`ShapeError`]: the aggregate result of validating one document, holding
//!   every [`ValidationIssue`] found in a single pass.

use crate::path::FieldPath;
use crate::shape::SchemaId;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, FhirShapeError>;

/// Engine-level errors
#[derive(Error, Debug)]
pub enum FhirShapeError {
    /// The resource kind is registered but has no shape definition
    #[error("Resource kind '{kind}' has no shape definition")]
    UnsupportedKind { kind: String },

    /// A schema handle from a different cache was passed in
    #[error("Schema {id} belongs to a different schema cache")]
    ForeignSchema { id: SchemaId },

    /// Schema construction failed
    #[error("Failed to build schema '{name}': {message}")]
    Build { name: String, message: String },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A document failed validation
    #[error(transparent)]
    Invalid(#[from] ShapeError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FhirShapeError {
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedKind { kind: kind.into() }
    }

    pub fn build(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The validation failure, if this error wraps one
    pub fn as_shape_error(&self) -> Option<&ShapeError> {
        match self {
            Self::Invalid(err) => Some(err),
            _ => None,
        }
    }
}

/// Classification of a single validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// A primitive value failed its format, pattern or range check
    Format,
    /// The JSON type is wrong (object expected, array expected, ...)
    WrongType,
    /// A coded value is outside its fixed enumeration
    EnumMismatch,
    /// A literal (the `resourceType` discriminator) does not match
    InvalidLiteral,
    MissingRequiredField,
    /// A property is not declared by the closed shape
    UnknownField,
    /// The discriminator names no known resource kind
    UnknownKind,
    /// The kind is known but has no shape definition
    UnsupportedKind,
    /// More than one member of a polymorphic group is present
    ChoiceConflict,
    /// Contained resources are disallowed for this schema
    ContainedForbidden,
    /// Nesting exceeded the configured recursion ceiling
    RecursionLimit,
    /// A schema id could not be dereferenced
    UnresolvedSchema,
}

impl IssueKind {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::Format => "format",
            IssueKind::WrongType => "wrong-type",
            IssueKind::EnumMismatch => "enum-mismatch",
            IssueKind::InvalidLiteral => "invalid-literal",
            IssueKind::MissingRequiredField => "missing-required-field",
            IssueKind::UnknownField => "unknown-field",
            IssueKind::UnknownKind => "unknown-kind",
            IssueKind::UnsupportedKind => "unsupported-kind",
            IssueKind::ChoiceConflict => "choice-conflict",
            IssueKind::ContainedForbidden => "contained-forbidden",
            IssueKind::RecursionLimit => "recursion-limit",
            IssueKind::UnresolvedSchema => "unresolved-schema",
        }
    }

    /// FHIR `IssueType` code used when rendering an OperationOutcome
    pub fn outcome_code(&self) -> &'static str {
        match self {
            IssueKind::Format | IssueKind::WrongType | IssueKind::InvalidLiteral => "value",
            IssueKind::EnumMismatch => "code-invalid",
            IssueKind::MissingRequiredField => "required",
            IssueKind::UnknownField | IssueKind::ChoiceConflict => "structure",
            IssueKind::UnknownKind | IssueKind::UnsupportedKind => "not-supported",
            IssueKind::ContainedForbidden => "business-rule",
            IssueKind::RecursionLimit => "too-costly",
            IssueKind::UnresolvedSchema => "exception",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single problem found while validating a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// Location of the offending value
    pub path: FieldPath,
    pub kind: IssueKind,
    /// Human-readable reason
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: FieldPath, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "[{}] {}", self.kind, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.kind, self.path, self.message)
        }
    }
}

/// Every issue found while validating one document against one schema
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{shape} failed validation with {count} issue(s)", count = .issues.len())]
pub struct ShapeError {
    /// Name of the schema the document was validated against
    pub shape: String,
    pub issues: Vec<ValidationIssue>,
}

impl ShapeError {
    pub fn new(shape: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self {
            shape: shape.into(),
            issues,
        }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Whether any issue has the given kind
    pub fn has_kind(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }

    /// Whether an issue of `kind` was reported at exactly `path`
    pub fn has_issue_at(&self, kind: IssueKind, path: &str) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.kind == kind && issue.path == path)
    }

    /// Issues reported at exactly `path`
    pub fn at_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.issues.iter().filter(move |issue| issue.path == path)
    }

    /// Render the issues as a FHIR OperationOutcome resource
    pub fn to_operation_outcome(&self) -> Value {
        let issues: Vec<Value> = self
            .issues
            .iter()
            .map(|issue| {
                let mut entry = json!({
                    "severity": "error",
                    "code": issue.kind.outcome_code(),
                    "diagnostics": issue.message,
                });
                if !issue.path.is_root() {
                    entry["expression"] = json!([issue.path.to_string()]);
                }
                entry
            })
            .collect();

        json!({
            "resourceType": "OperationOutcome",
            "issue": issues,
        })
    }
}
