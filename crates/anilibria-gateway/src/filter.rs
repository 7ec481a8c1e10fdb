//! Per-handler subscription filters.
//!
//! A [`Filter`] is a structural pattern matched against an event's raw JSON:
//!
//! - scalar: the candidate value at the key must be equal
//! - list: every listed scalar must appear in the candidate array
//! - nested filter: recurse into the candidate object at the key
//!
//! Every key must be present in the candidate and pass. An empty filter
//! matches everything.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::FilterError;

/// Literal a filter compares against.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    /// String literal.
    Str(String),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Boolean literal.
    Bool(bool),
}

impl Scalar {
    /// Whether `candidate` equals this literal. Integers and floats compare numerically.
    #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
    pub fn matches(&self, candidate: &Value) -> bool {
        match (self, candidate) {
            (Self::Str(expected), Value::String(actual)) => expected == actual,
            (Self::Bool(expected), Value::Bool(actual)) => expected == actual,
            (Self::Int(expected), Value::Number(actual)) => match actual.as_i64() {
                Some(actual) => *expected == actual,
                None => actual.as_f64() == Some(*expected as f64),
            },
            (Self::Float(expected), Value::Number(actual)) => actual.as_f64() == Some(*expected),
            _ => false,
        }
    }

    fn from_json(value: &Value, path: &str) -> Result<Self, FilterError> {
        match value {
            Value::String(s) => Ok(Self::Str(s.clone())),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => Ok(n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Float(f64::NAN))),
            Value::Null => Err(unsupported(path, "null is not a literal")),
            Value::Array(_) | Value::Object(_) => {
                Err(unsupported(path, "lists may only contain literals"))
            }
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Expected value under one filter key.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    /// Exact literal.
    Scalar(Scalar),
    /// Literals that must all appear in the candidate array.
    List(Vec<Scalar>),
    /// Sub-pattern for a nested object.
    Map(Filter),
}

impl FilterValue {
    /// Whether `candidate` satisfies this value.
    pub fn matches(&self, candidate: &Value) -> bool {
        match self {
            Self::Scalar(expected) => expected.matches(candidate),
            Self::List(expected) => match candidate {
                Value::Array(items) => expected
                    .iter()
                    .all(|e| items.iter().any(|item| e.matches(item))),
                _ => false,
            },
            Self::Map(sub) => sub.matches(candidate),
        }
    }
}

/// Structural pattern over an event's raw JSON.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter(BTreeMap<String, FilterValue>);

impl Filter {
    /// Empty filter, matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    #[must_use]
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        let _ = self.0.insert(key.into(), FilterValue::Scalar(value.into()));
        self
    }

    /// Require the array at `key` to contain every one of `values`.
    #[must_use]
    pub fn contains<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        let list = values.into_iter().map(Into::into).collect();
        let _ = self.0.insert(key.into(), FilterValue::List(list));
        self
    }

    /// Require the object at `key` to match `sub`.
    #[must_use]
    pub fn nested(mut self, key: impl Into<String>, sub: Filter) -> Self {
        let _ = self.0.insert(key.into(), FilterValue::Map(sub));
        self
    }

    /// Build from a JSON pattern such as `{"id": 8700, "genres": ["Драма"]}`.
    pub fn from_json(pattern: &Value) -> Result<Self, FilterError> {
        let Value::Object(map) = pattern else {
            return Err(FilterError::NotAnObject(type_name(pattern).to_string()));
        };
        Self::from_object(map, "")
    }

    fn from_object(
        map: &serde_json::Map<String, Value>,
        prefix: &str,
    ) -> Result<Self, FilterError> {
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            let parsed = match value {
                Value::Object(sub) => FilterValue::Map(Self::from_object(sub, &path)?),
                Value::Array(items) => FilterValue::List(
                    items
                        .iter()
                        .map(|item| Scalar::from_json(item, &path))
                        .collect::<Result<_, _>>()?,
                ),
                scalar => FilterValue::Scalar(Scalar::from_json(scalar, &path)?),
            };
            let _ = entries.insert(key.clone(), parsed);
        }
        Ok(Self(entries))
    }

    /// Whether `candidate` has every key of this filter with a matching value.
    pub fn matches(&self, candidate: &Value) -> bool {
        self.0.iter().all(|(key, expected)| {
            candidate
                .get(key)
                .is_some_and(|actual| expected.matches(actual))
        })
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the filter has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for Filter {
    type Error = FilterError;

    fn try_from(pattern: Value) -> Result<Self, Self::Error> {
        Self::from_json(&pattern)
    }
}

fn unsupported(path: &str, reason: &'static str) -> FilterError {
    FilterError::Unsupported {
        path: path.to_string(),
        reason,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
