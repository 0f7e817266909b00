//! Typed query parameters and parameterized statements.

use chrono::{DateTime, SecondsFormat, Utc};

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    /// A `STRING` value; `None` binds SQL `NULL`.
    String(Option<String>),
    /// A `TIMESTAMP` value.
    Timestamp(DateTime<Utc>),
    /// An `INT64` value.
    Int64(i64),
}

impl ParameterValue {
    /// The engine's type name for this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::String(_) => "STRING",
            ParameterValue::Timestamp(_) => "TIMESTAMP",
            ParameterValue::Int64(_) => "INT64",
        }
    }

    /// The textual wire form of the value, or `None` for `NULL`.
    pub fn wire_value(&self) -> Option<String> {
        match self {
            ParameterValue::String(value) => value.clone(),
            ParameterValue::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
            ParameterValue::Int64(n) => Some(n.to_string()),
        }
    }

    /// The value as a string, if it is a non-null `STRING`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(Some(value)) => Some(value),
            _ => None,
        }
    }
}

/// A named parameter referenced as `@name` in statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameter {
    pub name: String,
    pub value: ParameterValue,
}

impl QueryParameter {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ParameterValue::String(Some(value.into())),
        }
    }

    pub fn nullable_string(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value: ParameterValue::String(value),
        }
    }

    pub fn timestamp(name: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value: ParameterValue::Timestamp(value),
        }
    }

    pub fn int64(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: ParameterValue::Int64(value),
        }
    }
}

/// Statement text plus the parameters it references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryParameter>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn bind(mut self, param: QueryParameter) -> Self {
        self.params.push(param);
        self
    }

    /// Look up a bound parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParameterValue> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}
