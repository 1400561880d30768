//! Filter conditions.
//!
//! A condition is a field path, an operator and a value, parsed from the
//! `<path>` / `<path>__<operator>` key syntax and validated once at
//! construction so evaluation and translation never see a malformed one.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value;
use strum_macros::{AsRefStr, EnumIter, EnumString};

use crate::config::{PATH_DELIMITER, PRIMARY_KEY_FIELD};
use crate::error_handling::ConfigurationError;

/// Lookup names that look like operators but have no implementation here.
/// Rejected eagerly instead of being read as a nested field.
const UNSUPPORTED_LOOKUPS: &[&str] = &[
    "exact",
    "startswith",
    "istartswith",
    "endswith",
    "iendswith",
    "range",
    "isnull",
    "regex",
    "iregex",
    "nin",
];

/// Ordered sequence of path segments. One segment is a direct field; more
/// segments walk into nested mappings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Splits a `a__b__c` style key into segments. No validation.
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw.split(PATH_DELIMITER).map(str::to_string).collect(),
        }
    }

    /// Builds a path from explicit segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment: the top-level field (bin) this path starts from.
    pub fn root(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or("")
    }

    /// True for the reserved `pk` key.
    pub fn is_primary_key(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == PRIMARY_KEY_FIELD
    }

    /// Joins the segments with an arbitrary separator (`.` for the search backend).
    pub fn joined(&self, separator: &str) -> String {
        self.segments.join(separator)
    }

    fn has_empty_segment(&self) -> bool {
        self.segments.is_empty() || self.segments.iter().any(String::is_empty)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined(PATH_DELIMITER))
    }
}

impl From<&str> for FieldPath {
    fn from(raw: &str) -> Self {
        FieldPath::parse(raw)
    }
}

/// Comparison applied by a condition. `Eq` is implied by a missing suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    In,
    Iexact,
    Contains,
    Icontains,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl FilterOp {
    /// Parses a key suffix. `eq` is never a suffix: a field literally named
    /// `eq` stays a field.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.parse::<FilterOp>() {
            Ok(FilterOp::Eq) | Err(_) => None,
            Ok(op) => Some(op),
        }
    }

    /// Range operators (`gte`, `gt`, `lte`, `lt`).
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            FilterOp::Gte | FilterOp::Gt | FilterOp::Lte | FilterOp::Lt
        )
    }
}

/// Unary predicate over the resolved field value (`None` when absent).
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync>);

impl Predicate {
    pub fn new(f: impl Fn(Option<&Value>) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: Option<&Value>) -> bool {
        (self.0)(value)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone)]
pub enum FilterValue {
    /// Plain JSON value; `Null` stands for "no value".
    Json(Value),
    /// Date/time; stored timestamp strings are coerced before comparing.
    DateTime(NaiveDateTime),
    /// Callable test, only valid without an operator suffix.
    Predicate(Predicate),
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        FilterValue::Json(value)
    }
}

impl From<NaiveDateTime> for FilterValue {
    fn from(value: NaiveDateTime) -> Self {
        FilterValue::DateTime(value)
    }
}

impl From<Predicate> for FilterValue {
    fn from(value: Predicate) -> Self {
        FilterValue::Predicate(value)
    }
}

/// One immutable filter condition.
#[derive(Debug, Clone)]
pub struct FilterCondition {
    path: FieldPath,
    op: FilterOp,
    value: FilterValue,
}

impl FilterCondition {
    /// Builds a condition from its parts, checking the value fits the operator.
    pub fn new(
        path: FieldPath,
        op: FilterOp,
        value: impl Into<FilterValue>,
    ) -> Result<Self, ConfigurationError> {
        let condition = Self {
            path,
            op,
            value: value.into(),
        };
        if condition.path.has_empty_segment() {
            return Err(ConfigurationError::InvalidPath(condition.key()));
        }
        condition.validate()?;
        Ok(condition)
    }

    /// Parses `<path>` or `<path>__<operator>`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedOperator` for lookup suffixes like `startswith`
    /// - `MisplacedOperator` when an operator name is not the last segment
    /// - `InvalidFilterValue` when the value does not fit the operator
    pub fn parse(key: &str, value: impl Into<FilterValue>) -> Result<Self, ConfigurationError> {
        let segments: Vec<&str> = key.split(PATH_DELIMITER).collect();
        let (path_segments, op) = match segments.split_last() {
            Some((last, init)) if !init.is_empty() => {
                if let Some(op) = FilterOp::from_suffix(last) {
                    (init, op)
                } else if UNSUPPORTED_LOOKUPS.contains(last) {
                    return Err(ConfigurationError::UnsupportedOperator {
                        condition: key.to_string(),
                        operator: (*last).to_string(),
                    });
                } else {
                    (&segments[..], FilterOp::Eq)
                }
            }
            _ => (&segments[..], FilterOp::Eq),
        };

        if let Some(misplaced) = path_segments
            .iter()
            .find(|s| path_segments.len() > 1 && FilterOp::from_suffix(s).is_some())
        {
            return Err(ConfigurationError::MisplacedOperator {
                condition: key.to_string(),
                operator: (*misplaced).to_string(),
            });
        }

        Self::new(
            FieldPath::from_segments(path_segments.iter().copied()),
            op,
            value,
        )
    }

    /// Builds a condition from a path and an operator name.
    pub fn with_operator(
        path: &str,
        operator: &str,
        value: impl Into<FilterValue>,
    ) -> Result<Self, ConfigurationError> {
        let op = operator
            .parse::<FilterOp>()
            .map_err(|_| ConfigurationError::UnsupportedOperator {
                condition: format!("{path}{PATH_DELIMITER}{operator}"),
                operator: operator.to_string(),
            })?;
        Self::new(FieldPath::parse(path), op, value)
    }

    /// Builds a callable-predicate condition on `path`.
    pub fn predicate(
        path: &str,
        f: impl Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Result<Self, ConfigurationError> {
        Self::new(FieldPath::parse(path), FilterOp::Eq, Predicate::new(f))
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn op(&self) -> FilterOp {
        self.op
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    /// True when this condition targets the record's primary key.
    pub fn is_primary_key(&self) -> bool {
        self.path.is_primary_key()
    }

    /// Key in `<path>__<operator>` form, as a caller would have written it.
    pub fn key(&self) -> String {
        match self.op {
            FilterOp::Eq => self.path.to_string(),
            op => format!("{}{}{}", self.path, PATH_DELIMITER, op.as_ref()),
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |expected: &'static str| ConfigurationError::InvalidFilterValue {
            condition: self.key(),
            expected,
        };

        match (&self.value, self.op) {
            (FilterValue::Predicate(_), FilterOp::Eq) => Ok(()),
            (FilterValue::Predicate(_), _) => {
                Err(invalid("a plain value (callables only apply without an operator)"))
            }
            (_, FilterOp::Eq | FilterOp::Ne) => Ok(()),
            (FilterValue::Json(Value::Array(_)), FilterOp::In) => Ok(()),
            (_, FilterOp::In) => Err(invalid("a list of values")),
            (FilterValue::Json(Value::String(_)), FilterOp::Iexact)
            | (FilterValue::Json(Value::String(_)), FilterOp::Contains)
            | (FilterValue::Json(Value::String(_)), FilterOp::Icontains) => Ok(()),
            (_, FilterOp::Iexact | FilterOp::Contains | FilterOp::Icontains) => {
                Err(invalid("a string"))
            }
            (FilterValue::Json(Value::Number(_)), _)
            | (FilterValue::Json(Value::String(_)), _)
            | (FilterValue::DateTime(_), _) => Ok(()),
            (_, _) => Err(invalid("a number, string or date")),
        }
    }
}
