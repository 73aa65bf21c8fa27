//! Typed query predicates.
//!
//! A `Filter` renders to the hosted store's formula language for HTTP queries
//! and evaluates directly against in-memory records, so the same query means
//! the same thing in production and in tests.

use super::Record;
use chrono::NaiveDate;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals a scalar value.
    Eq(String, Value),
    /// Date (or date-time) field falls on the given day.
    DateEq(String, NaiveDate),
    /// Checkbox-style field is set.
    IsTrue(String),
    /// Checkbox-style field is unset or missing.
    IsFalse(String),
    IsBlank(String),
    RecordIdIn(Vec<String>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn date_eq(field: &str, date: NaiveDate) -> Self {
        Filter::DateEq(field.to_string(), date)
    }

    pub fn is_true(field: &str) -> Self {
        Filter::IsTrue(field.to_string())
    }

    pub fn is_false(field: &str) -> Self {
        Filter::IsFalse(field.to_string())
    }

    pub fn is_blank(field: &str) -> Self {
        Filter::IsBlank(field.to_string())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Filter) -> Self {
        Filter::Not(Box::new(inner))
    }

    // -----------------------------------------------------------------------
    // Formula rendering
    // -----------------------------------------------------------------------

    /// Render as a store formula (`filterByFormula`).
    pub fn to_formula(&self) -> String {
        match self {
            Filter::Eq(field, value) => format!("{} = {}", field_ref(field), literal(value)),
            Filter::DateEq(field, date) => format!(
                "DATESTR({}) = '{}'",
                field_ref(field),
                date.format("%Y-%m-%d")
            ),
            Filter::IsTrue(field) => format!("{} = TRUE()", field_ref(field)),
            Filter::IsFalse(field) => format!("NOT({})", field_ref(field)),
            Filter::IsBlank(field) => format!("{} = BLANK()", field_ref(field)),
            Filter::RecordIdIn(ids) => {
                if ids.is_empty() {
                    return "FALSE()".to_string();
                }
                let parts: Vec<String> = ids
                    .iter()
                    .map(|id| format!("RECORD_ID() = '{}'", escape(id)))
                    .collect();
                format!("OR({})", parts.join(", "))
            }
            Filter::And(parts) => join("AND", "TRUE()", parts),
            Filter::Or(parts) => join("OR", "FALSE()", parts),
            Filter::Not(inner) => format!("NOT({})", inner.to_formula()),
        }
    }

    // -----------------------------------------------------------------------
    // In-memory evaluation
    // -----------------------------------------------------------------------

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Eq(field, expected) => match record.fields.get(field) {
                Some(actual) => values_equal(actual, expected),
                None => is_blank_value(expected),
            },
            Filter::DateEq(field, date) => record
                .fields
                .get(field)
                .and_then(Value::as_str)
                .map(|s| s.starts_with(&date.format("%Y-%m-%d").to_string()))
                .unwrap_or(false),
            Filter::IsTrue(field) => record.fields.get(field).map(truthy).unwrap_or(false),
            Filter::IsFalse(field) => !record.fields.get(field).map(truthy).unwrap_or(false),
            Filter::IsBlank(field) => record.fields.get(field).map(is_blank_value).unwrap_or(true),
            Filter::RecordIdIn(ids) => ids.iter().any(|id| id == &record.id),
            Filter::And(parts) => parts.iter().all(|p| p.matches(record)),
            Filter::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Filter::Not(inner) => !inner.matches(record),
        }
    }
}

fn field_ref(field: &str) -> String {
    format!("{{{field}}}")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", escape(s)),
        Value::Bool(true) => "TRUE()".to_string(),
        Value::Bool(false) => "FALSE()".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "BLANK()".to_string(),
        other => format!("'{}'", escape(&other.to_string())),
    }
}

fn join(func: &str, empty: &str, parts: &[Filter]) -> String {
    match parts {
        [] => empty.to_string(),
        [single] => single.to_formula(),
        _ => {
            let rendered: Vec<String> = parts.iter().map(Filter::to_formula).collect();
            format!("{func}({})", rendered.join(", "))
        }
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
        Value::Null => false,
    }
}

fn is_blank_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a)) => {
            a.to_string() == *b
        }
        (a, b) => is_blank_value(a) && is_blank_value(b),
    }
}
