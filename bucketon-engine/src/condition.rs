//! Condition compiler: turns a [`ConditionSpec`] into a [`KeyFn`].
//!
//! Conditions are declarative. Where the key cannot be expressed as a field
//! reference, callers supply a typed function (`ConditionSpec::Literal`);
//! there is no embedded expression evaluator.

use bucketon_model::Record;
use bucketon_types::{BucketKey, DerivedKey, Error, KeyError, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Outcome of deriving one record's key.
pub type KeyResult = std::result::Result<DerivedKey, KeyError>;

/// A compiled key-derivation function.
pub type KeyFn = Arc<dyn Fn(&dyn Record) -> KeyResult + Send + Sync>;

fn key_fn<F>(f: F) -> KeyFn
where
    F: Fn(&dyn Record) -> KeyResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// How the parts of a composite condition combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Concatenate the part keys with no separator.
    Concat,
    /// Every part must yield a non-empty key; the last part's key is the
    /// result. The first empty part short-circuits to `"nil"`.
    And,
}

/// Declarative description of how to derive a grouping key from a record.
#[derive(Clone)]
pub enum ConditionSpec {
    /// A caller-supplied pure function.
    Literal(KeyFn),
    /// The stringified value of a named field.
    FieldRef(String),
    /// A timestamp field rendered with a strftime format.
    Formatted { field: String, format: String },
    Composite {
        parts: Vec<ConditionSpec>,
        combinator: Combinator,
    },
}

impl fmt::Debug for ConditionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("Literal(<fn>)"),
            Self::FieldRef(name) => f.debug_tuple("FieldRef").field(name).finish(),
            Self::Formatted { field, format } => f
                .debug_struct("Formatted")
                .field("field", field)
                .field("format", format)
                .finish(),
            Self::Composite { parts, combinator } => f
                .debug_struct("Composite")
                .field("parts", parts)
                .field("combinator", combinator)
                .finish(),
        }
    }
}

impl ConditionSpec {
    pub fn literal<F>(f: F) -> Self
    where
        F: Fn(&dyn Record) -> KeyResult + Send + Sync + 'static,
    {
        Self::Literal(key_fn(f))
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::FieldRef(name.into())
    }

    pub fn formatted(field: impl Into<String>, format: impl Into<String>) -> Self {
        Self::Formatted {
            field: field.into(),
            format: format.into(),
        }
    }

    pub fn concat(parts: impl IntoIterator<Item = ConditionSpec>) -> Self {
        Self::Composite {
            parts: parts.into_iter().collect(),
            combinator: Combinator::Concat,
        }
    }

    pub fn all(parts: impl IntoIterator<Item = ConditionSpec>) -> Self {
        Self::Composite {
            parts: parts.into_iter().collect(),
            combinator: Combinator::And,
        }
    }

    /// Parses the declarative option form.
    ///
    /// - `null` → no condition
    /// - `"name"` → field reference
    /// - `[a, b, ...]` → all parts must hold
    /// - `{"concat": [...]}` / `{"all": [...]}` → explicit combinator
    /// - `{"field": "due_at", "format": "%y%m%d"}` → formatted timestamp
    pub fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Array(items) => Ok(Some(Self::all(parts_from_values(items)?))),
            Value::String(name) => Ok(Some(Self::field(name.as_str()))),
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(Value::Array(items)) = map.get("concat") {
                        return Ok(Some(Self::concat(parts_from_values(items)?)));
                    }
                    if let Some(Value::Array(items)) = map.get("all") {
                        return Ok(Some(Self::all(parts_from_values(items)?)));
                    }
                }
                match (map.get("field"), map.get("format"), map.len()) {
                    (Some(Value::String(field)), None, 1) => Ok(Some(Self::field(field.as_str()))),
                    (Some(Value::String(field)), Some(Value::String(format)), 2) => {
                        Ok(Some(Self::formatted(field.as_str(), format.as_str())))
                    }
                    _ => Err(invalid(value)),
                }
            }
            Value::Bool(_) | Value::Number(_) => Err(invalid(value)),
        }
    }
}

fn invalid(value: &Value) -> Error {
    Error::InvalidConditions(format!("unsupported condition: {value}"))
}

fn parts_from_values(items: &[Value]) -> Result<Vec<ConditionSpec>> {
    items
        .iter()
        .map(|item| ConditionSpec::from_value(item)?.ok_or_else(|| invalid(item)))
        .collect()
}

/// Compiles a condition into a key function.
///
/// With no condition every record derives the `"nil"` key.
pub fn compile(spec: Option<&ConditionSpec>) -> Result<KeyFn> {
    let Some(spec) = spec else {
        return Ok(key_fn(|_| Ok(DerivedKey::bare(BucketKey::NIL))));
    };

    match spec {
        ConditionSpec::Literal(f) => Ok(Arc::clone(f)),
        ConditionSpec::FieldRef(name) => {
            let name = field_name(name)?;
            Ok(key_fn(move |record| {
                let value = record.field(&name)?;
                Ok(DerivedKey::bare(value_text(&value)))
            }))
        }
        ConditionSpec::Formatted { field, format } => {
            let field = field_name(field)?;
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(Error::InvalidConditions(format!("invalid time format '{format}'")));
            }
            let format = format.clone();
            Ok(key_fn(move |record| {
                let value = record.field(&field)?;
                format_timestamp(&field, &value, &format).map(DerivedKey::bare)
            }))
        }
        ConditionSpec::Composite { parts, combinator } => {
            if parts.is_empty() {
                return Err(Error::InvalidConditions("composite condition has no parts".into()));
            }
            let fns = parts
                .iter()
                .map(|part| compile(Some(part)))
                .collect::<Result<Vec<_>>>()?;
            Ok(match combinator {
                Combinator::Concat => key_fn(move |record| {
                    let mut key = String::new();
                    for f in &fns {
                        key.push_str(&f(record)?.key);
                    }
                    Ok(DerivedKey::bare(key))
                }),
                Combinator::And => key_fn(move |record| {
                    let mut last = DerivedKey::default();
                    for f in &fns {
                        last = f(record)?;
                        if last.is_falsy() {
                            return Ok(DerivedKey::default());
                        }
                    }
                    Ok(last)
                }),
            })
        }
    }
}

fn field_name(name: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::InvalidConditions("empty field name".into()));
    }
    Ok(name.to_string())
}

/// Stringifies a field value. `null` and `false` become the empty string, so
/// they route to `"nil"` whether read alone or inside a composite.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_timestamp(
    field: &str,
    value: &Value,
    format: &str,
) -> std::result::Result<String, KeyError> {
    let timestamp = match value {
        Value::Null => return Ok(String::new()),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.fixed_offset()),
        Value::String(s) => parse_timestamp(s),
        _ => {
            return Err(KeyError::TypeMismatch {
                field: field.to_string(),
                expected: "a timestamp",
            });
        }
    };
    let timestamp = timestamp.ok_or_else(|| KeyError::InvalidTimestamp {
        field: field.to_string(),
        value: value_text(value),
    })?;

    let mut out = String::new();
    write!(out, "{}", timestamp.format(format)).map_err(|_| KeyError::InvalidTimestamp {
        field: field.to_string(),
        value: value_text(value),
    })?;
    Ok(out)
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}
