//! FHIR primitive datatype validation
//!
//! Each primitive type checks a JSON value for the right JSON type and then
//! for the FHIR R4 lexical format. Calendar validity of complete dates and
//! date-times is delegated to chrono, `url` values to the url crate.

use chrono::{DateTime, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use url::Url;

/// FHIR primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Integer,
    String,
    Decimal,
    Uri,
    Url,
    Canonical,
    Base64Binary,
    Instant,
    Date,
    DateTime,
    Time,
    Code,
    Oid,
    Id,
    Markdown,
    UnsignedInt,
    PositiveInt,
    Uuid,
    Xhtml,
}

impl PrimitiveType {
    pub const ALL: &'static [PrimitiveType] = &[
        PrimitiveType::Boolean,
        PrimitiveType::Integer,
        PrimitiveType::String,
        PrimitiveType::Decimal,
        PrimitiveType::Uri,
        PrimitiveType::Url,
        PrimitiveType::Canonical,
        PrimitiveType::Base64Binary,
        PrimitiveType::Instant,
        PrimitiveType::Date,
        PrimitiveType::DateTime,
        PrimitiveType::Time,
        PrimitiveType::Code,
        PrimitiveType::Oid,
        PrimitiveType::Id,
        PrimitiveType::Markdown,
        PrimitiveType::UnsignedInt,
        PrimitiveType::PositiveInt,
        PrimitiveType::Uuid,
        PrimitiveType::Xhtml,
    ];

    /// Look up a primitive type by its FHIR name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Integer => "integer",
            PrimitiveType::String => "string",
            PrimitiveType::Decimal => "decimal",
            PrimitiveType::Uri => "uri",
            PrimitiveType::Url => "url",
            PrimitiveType::Canonical => "canonical",
            PrimitiveType::Base64Binary => "base64Binary",
            PrimitiveType::Instant => "instant",
            PrimitiveType::Date => "date",
            PrimitiveType::DateTime => "dateTime",
            PrimitiveType::Time => "time",
            PrimitiveType::Code => "code",
            PrimitiveType::Oid => "oid",
            PrimitiveType::Id => "id",
            PrimitiveType::Markdown => "markdown",
            PrimitiveType::UnsignedInt => "unsignedInt",
            PrimitiveType::PositiveInt => "positiveInt",
            PrimitiveType::Uuid => "uuid",
            PrimitiveType::Xhtml => "xhtml",
        }
    }

    /// Type-name suffix used by polymorphic fields (`valueDateTime`)
    pub fn choice_suffix(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }

    /// JSON type the value must have before the format is checked
    fn json_type(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Integer | PrimitiveType::UnsignedInt | PrimitiveType::PositiveInt => {
                "integer"
            }
            PrimitiveType::Decimal => "number",
            _ => "string",
        }
    }

    /// Check a JSON value against this primitive type
    pub fn check(&self, value: &Value) -> Result<(), PrimitiveFailure> {
        match self {
            PrimitiveType::Boolean => match value {
                Value::Bool(_) => Ok(()),
                other => Err(self.wrong_type(other)),
            },
            PrimitiveType::Integer => self.check_integer(value, i64::from(i32::MIN)),
            PrimitiveType::UnsignedInt => self.check_integer(value, 0),
            PrimitiveType::PositiveInt => self.check_integer(value, 1),
            PrimitiveType::Decimal => match value {
                Value::Number(_) => Ok(()),
                other => Err(self.wrong_type(other)),
            },
            _ => {
                let Some(text) = value.as_str() else {
                    return Err(self.wrong_type(value));
                };
                self.check_text(text)
            }
        }
    }

    fn check_integer(&self, value: &Value, min: i64) -> Result<(), PrimitiveFailure> {
        let in_range = match (value.as_i64(), value.as_u64()) {
            (Some(number), _) => (min..=i64::from(i32::MAX)).contains(&number),
            // Integers beyond i64 are still integers, just out of range
            (None, Some(_)) => false,
            (None, None) => return Err(self.wrong_type(value)),
        };
        if !in_range {
            return Err(PrimitiveFailure::Format {
                primitive: *self,
                message: format!(
                    "{} {} is outside the range {}..={}",
                    self.as_str(),
                    value,
                    min,
                    i32::MAX
                ),
            });
        }
        Ok(())
    }

    fn check_text(&self, text: &str) -> Result<(), PrimitiveFailure> {
        let patterns = &*PATTERNS;
        let valid = match self {
            PrimitiveType::String => patterns.string.is_match(text),
            PrimitiveType::Markdown => !text.is_empty(),
            PrimitiveType::Uri | PrimitiveType::Canonical => patterns.uri.is_match(text),
            PrimitiveType::Url => Url::parse(text).is_ok(),
            PrimitiveType::Base64Binary => patterns.base64.is_match(text),
            PrimitiveType::Instant => {
                patterns.instant.is_match(text) && DateTime::parse_from_rfc3339(text).is_ok()
            }
            PrimitiveType::Date => patterns.date.is_match(text) && is_calendar_date(text),
            PrimitiveType::DateTime => {
                patterns.date_time.is_match(text) && is_calendar_date_time(text)
            }
            PrimitiveType::Time => {
                patterns.time.is_match(text)
                    && NaiveTime::parse_from_str(text, "%H:%M:%S%.f").is_ok()
            }
            PrimitiveType::Code => patterns.code.is_match(text),
            PrimitiveType::Oid => patterns.oid.is_match(text),
            PrimitiveType::Id => patterns.id.is_match(text),
            PrimitiveType::Uuid => patterns.uuid.is_match(text),
            PrimitiveType::Xhtml => text.trim_start().starts_with("<div"),
            PrimitiveType::Boolean
            | PrimitiveType::Integer
            | PrimitiveType::Decimal
            | PrimitiveType::UnsignedInt
            | PrimitiveType::PositiveInt => false,
        };

        if valid {
            Ok(())
        } else {
            Err(PrimitiveFailure::Format {
                primitive: *self,
                message: format!("'{}' is not a valid {}", truncate(text), self.as_str()),
            })
        }
    }

    fn wrong_type(&self, value: &Value) -> PrimitiveFailure {
        PrimitiveFailure::WrongType {
            primitive: *self,
            expected: self.json_type(),
            found: json_type_name(value),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a primitive value was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveFailure {
    /// Wrong JSON type for the primitive
    WrongType {
        primitive: PrimitiveType,
        expected: &'static str,
        found: &'static str,
    },
    /// Right JSON type, but the lexical form or range is invalid
    Format {
        primitive: PrimitiveType,
        message: String,
    },
}

impl fmt::Display for PrimitiveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveFailure::WrongType {
                primitive,
                expected,
                found,
            } => write!(f, "expected {expected} for {primitive}, found {found}"),
            PrimitiveFailure::Format { message, .. } => f.write_str(message),
        }
    }
}

/// Compiled FHIR R4 lexical patterns
struct Patterns {
    string: Regex,
    uri: Regex,
    base64: Regex,
    instant: Regex,
    date: Regex,
    date_time: Regex,
    time: Regex,
    code: Regex,
    oid: Regex,
    id: Regex,
    uuid: Regex,
}

const YEAR: &str = r"([0-9]([0-9]([0-9][1-9]|[1-9]0)|[1-9]00)|[1-9]000)";
const CLOCK: &str = r"([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]+)?";
const ZONE: &str = r"(Z|(\+|-)((0[0-9]|1[0-3]):[0-5][0-9]|14:00))";

static PATTERNS: Lazy<Patterns> = Lazy::new(|| Patterns {
    string: anchored(r"[ \r\n\t\S]+"),
    uri: anchored(r"\S*"),
    base64: anchored(r"(\s*([0-9a-zA-Z\+/=]){4}\s*)+"),
    instant: anchored(&format!(
        r"{YEAR}-(0[1-9]|1[0-2])-(0[1-9]|[1-2][0-9]|3[0-1])T{CLOCK}{ZONE}"
    )),
    date: anchored(&format!(
        r"{YEAR}(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1]))?)?"
    )),
    date_time: anchored(&format!(
        r"{YEAR}(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1])(T{CLOCK}{ZONE})?)?)?"
    )),
    time: anchored(CLOCK),
    code: anchored(r"[^\s]+(\s[^\s]+)*"),
    oid: anchored(r"urn:oid:[0-2](\.(0|[1-9][0-9]*))+"),
    id: anchored(r"[A-Za-z0-9\-\.]{1,64}"),
    uuid: anchored(r"urn:uuid:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"),
});

fn anchored(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{pattern})$")).expect("FHIR primitive patterns are valid regexes")
}

/// Partial dates (`2024`, `2024-02`) are checked by pattern only
fn is_calendar_date(text: &str) -> bool {
    text.len() != 10 || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

fn is_calendar_date_time(text: &str) -> bool {
    if text.contains('T') {
        DateTime::parse_from_rfc3339(text).is_ok()
    } else {
        is_calendar_date(text)
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 64;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{head}...")
    }
}

/// Name of a JSON value's type, for messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
