//! The filter kind contract and the values it produces.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use sea_orm::{Condition, DatabaseBackend, sea_query::SimpleExpr};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::AttributeType;

/// Applied filters, keyed by canonical field notation.
pub type FilterMap = BTreeMap<String, FilterValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Contains,
    StartsWith,
    EndsWith,
    Equals,
    /// Multi-value: match any of the values.
    Any,
    /// Multi-value: match all of the values.
    All,
    /// Range with optional bounds.
    Between,
}

impl FilterOperator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Equals => "equals",
            Self::Any => "any",
            Self::All => "all",
            Self::Between => "between",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contains" => Some(Self::Contains),
            "starts_with" => Some(Self::StartsWith),
            "ends_with" => Some(Self::EndsWith),
            "equals" | "eq" => Some(Self::Equals),
            "any" => Some(Self::Any),
            "all" => Some(Self::All),
            "between" => Some(Self::Between),
            _ => None,
        }
    }
}

/// Numeric bound, integral or floating depending on the column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

impl From<Number> for sea_orm::Value {
    fn from(number: Number) -> Self {
        match number {
            Number::Int(value) => value.into(),
            Number::Float(value) => value.into(),
        }
    }
}

/// Normalized filter payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterData {
    Text(String),
    Choice(String),
    Choices(Vec<String>),
    Boolean(bool),
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    NumberRange {
        min: Option<Number>,
        max: Option<Number>,
    },
    /// Payload of a kind registered by the host application.
    Custom(Value),
}

/// A processed, validated filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterValue {
    /// Registry id of the kind that produced this value.
    pub kind: String,
    pub value: FilterData,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
}

impl FilterValue {
    #[must_use]
    pub fn new(kind: impl Into<String>, value: FilterData, operator: FilterOperator) -> Self {
        Self {
            kind: kind.into(),
            value,
            operator,
            case_sensitive: None,
        }
    }

    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = Some(case_sensitive);
        self
    }
}

/// Raw input as it arrives from a form control or URL parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFilterInput {
    Single(String),
    Many(Vec<String>),
}

impl RawFilterInput {
    /// First value, trimmed.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.trim()),
            Self::Many(values) => values.first().map(|value| value.trim()),
        }
    }

    /// Every non-blank value, trimmed. A single string is split on commas.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::Single(value) => value.split(',').collect(),
            Self::Many(values) => values.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The two sides of a range: `"a,b"` or `["a", "b"]`.
    #[must_use]
    pub fn bounds(&self) -> (String, String) {
        match self {
            Self::Single(value) => match value.split_once(',') {
                Some((low, high)) => (low.trim().to_string(), high.trim().to_string()),
                None => (value.trim().to_string(), String::new()),
            },
            Self::Many(values) => (
                values.first().map(|v| v.trim().to_string()).unwrap_or_default(),
                values.get(1).map(|v| v.trim().to_string()).unwrap_or_default(),
            ),
        }
    }

    /// Whether every value is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Single(value) => value.trim().is_empty(),
            Self::Many(values) => values.iter().all(|value| value.trim().is_empty()),
        }
    }

    /// Total byte length across values.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Single(value) => value.len(),
            Self::Many(values) => values.iter().map(String::len).sum(),
        }
    }
}

impl From<&str> for RawFilterInput {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<&str>> for RawFilterInput {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Ordered key/value options attached to a column or a kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions(Vec<(String, Value)>);

impl FilterOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| existing == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Option values of a choice list. Accepts plain strings,
    /// `[label, value]` pairs and `{"value": ...}` objects.
    #[must_use]
    pub fn choices(&self, key: &str) -> Vec<String> {
        let Some(Value::Array(items)) = self.get(key) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(value) => Some(value.clone()),
                Value::Array(pair) => pair.get(1).map(value_to_string),
                Value::Object(object) => object.get("value").map(value_to_string),
                Value::Number(_) | Value::Bool(_) => Some(value_to_string(item)),
                Value::Null => None,
            })
            .collect()
    }

    /// `self` layered over `defaults`.
    #[must_use]
    pub fn merged_over(&self, defaults: &FilterOptions) -> FilterOptions {
        let mut merged = defaults.clone();
        for (key, value) in &self.0 {
            merged.set(key, value.clone());
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}

/// What a kind knows about the column it is processing input for.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMeta<'a> {
    /// Registry id the column declared.
    pub kind: &'a str,
    /// Canonical field notation.
    pub field: &'a str,
    /// Kind defaults merged with column options.
    pub options: &'a FilterOptions,
    pub attribute_type: Option<&'a AttributeType>,
}

/// The SQL side of a filter: the value expression and how to read it.
#[derive(Debug, Clone)]
pub struct FilterTarget<'a> {
    pub expr: SimpleExpr,
    pub attribute_type: Option<&'a AttributeType>,
    pub backend: DatabaseBackend,
}

/// A family of filters: how input is cleaned up, checked, written back to
/// the URL and turned into a predicate.
pub trait FilterKind: Send + Sync {
    /// UI control the kind expects, e.g. `"text_input"`.
    fn render_hint(&self) -> &'static str;

    fn default_options(&self) -> FilterOptions {
        FilterOptions::new()
    }

    /// Whether the input means "no filter".
    fn is_empty(&self, raw: &RawFilterInput) -> bool {
        raw.is_blank()
    }

    /// Normalize raw input. `None` drops the filter.
    fn process(&self, raw: &RawFilterInput, column: &ColumnMeta<'_>) -> Option<FilterValue>;

    fn validate(&self, value: &FilterValue) -> bool;

    /// Inverse of [`FilterKind::process`] for URL encoding.
    fn encode(&self, value: &FilterValue) -> RawFilterInput;

    /// Predicate for the target, or `None` when the value adds no constraint.
    fn predicate(&self, target: &FilterTarget<'_>, value: &FilterValue) -> Option<Condition>;
}
