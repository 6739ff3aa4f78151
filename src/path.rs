//! Locations inside a validated document.
//!
//! Paths render in dot/bracket notation, e.g. `entry[0].resource.gender`.

use serde::{Serialize, Serializer};
use std::fmt;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object property
    Field(String),
    /// Array index
    Index(usize),
}

/// Path from the validated root to a nested value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The document root (renders as an empty string)
    pub fn root() -> Self {
        Self::default()
    }

    /// Return a new path extended with a property name
    pub fn field(&self, name: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push_field(name);
        path
    }

    /// Return a new path extended with an array index
    pub fn index(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.push_index(index);
        path
    }

    pub fn push_field(&mut self, name: impl Into<String>) {
        self.segments.push(PathSegment::Field(name.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Name of the last property on the path, skipping indices
    pub fn last_field(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            PathSegment::Field(name) => Some(name.as_str()),
            PathSegment::Index(_) => None,
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if position == 0 => write!(f, "{name}")?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl PartialEq<str> for FieldPath {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

impl PartialEq<&str> for FieldPath {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_renders_empty() {
        assert_eq!(FieldPath::root().to_string(), "");
        assert!(FieldPath::root().is_root());
    }

    #[test]
    fn test_dot_bracket_notation() {
        let path = FieldPath::root()
            .field("entry")
            .index(0)
            .field("resource")
            .field("gender");
        assert_eq!(path.to_string(), "entry[0].resource.gender");
        assert_eq!(path.last_field(), Some("gender"));
    }

    #[test]
    fn test_push_and_pop() {
        let mut path = FieldPath::root();
        path.push_field("name");
        path.push_index(2);
        assert_eq!(path, "name[2]");

        assert_eq!(path.pop(), Some(PathSegment::Index(2)));
        assert_eq!(path, "name");
        assert_eq!(path.pop(), Some(PathSegment::Field("name".to_string())));
        assert!(path.is_root());
        assert_eq!(path.pop(), None);
    }

    #[test]
    fn test_serializes_as_string() {
        let path = FieldPath::root().field("agent").index(1).field("requestor");
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, serde_json::json!("agent[1].requestor"));
    }
}
