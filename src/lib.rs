//! # OctoFHIR FHIRShape
//!
//! Closed-shape validation of FHIR R4 resources in memory.
//!
//! ## Features
//!
//! - **Closed shapes**: any property a resource or datatype does not declare is rejected
//! - **Recursive schema cache**: schemas reference each other by id, so self-referential
//!   types (`Extension.extension`, contained resources) build once and terminate
//! - **Parameterized contained slot**: the element schema of `contained` is chosen by
//!   the caller and is part of the cache key
//! - **Single-pass error reporting**: every issue is returned with its path
//!
//! ## Quick Start
//!
//! ```rust
//! use octofhir_fhirshape::{ResourceKind, SchemaCache, ShapeOptions};
//! use serde_json::json;
//!
//! # fn example() -> octofhir_fhirshape::Result<()> {
//! let cache = SchemaCache::new();
//! let patient = cache.resource(ResourceKind::Patient, ShapeOptions::default())?;
//!
//! let validated = patient.validate(&json!({
//!     "resourceType": "Patient",
//!     "gender": "unknown",
//!     "active": true
//! }))?;
//! assert_eq!(validated.kind(), Some(ResourceKind::Patient));
//!
//! // Dispatch on resourceType
//! let result = cache.validate_any_resource(&json!({ "resourceType": "NotAKind" }));
//! assert!(result.is_err());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod builder;
pub mod cache;
pub mod config;
pub mod datatypes;
pub mod error;
pub mod path;
pub mod primitive;
pub mod registry;
mod resources;
pub mod schema;
pub mod shape;
mod validator;

pub use cache::{CacheStats, SchemaCache, WarmUpReport};
pub use config::ValidationConfig;
pub use datatypes::ComplexType;
pub use error::Result;
pub use error::{FhirShapeError, IssueKind, ShapeError, ValidationIssue};
pub use path::{FieldPath, PathSegment};
pub use primitive::{PrimitiveFailure, PrimitiveType};
pub use registry::{ResourceKind, UnknownResourceKind};
pub use schema::{Schema, ShapeOptions, Validated};
pub use shape::{FieldSummary, SchemaId, SchemaKey, ShapeSummary};
