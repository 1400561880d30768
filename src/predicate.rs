//! Client-side predicate evaluation.
//!
//! Used for stores with no native filtering: each fetched record is tested
//! against the query's `filter` and `exclude` conditions in process. Type
//! mismatches never raise; they simply fail to match.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::projection::Record;
use crate::query::{coerce_stored_timestamp, FilterCondition, FilterOp, FilterValue, QuerySpec};

/// Left-hand side of a comparison after timestamp coercion.
enum Operand<'a> {
    Json(Option<&'a Value>),
    DateTime(NaiveDateTime),
}

/// True if `record` satisfies every filter and none of the exclusions.
/// Records without a body (or with an empty one) never match.
pub fn record_matches(spec: &QuerySpec, record: &Record) -> bool {
    let Some(body) = record.body().filter(|b| !b.is_empty()) else {
        return false;
    };
    let kept = spec
        .filters()
        .iter()
        .all(|c| condition_matches(c, record, body));
    kept && !spec
        .exclusions()
        .iter()
        .any(|c| condition_matches(c, record, body))
}

/// Evaluates one condition against a record body.
pub fn condition_matches(
    condition: &FilterCondition,
    record: &Record,
    body: &Map<String, Value>,
) -> bool {
    if condition.is_primary_key() {
        return apply(condition, record.key());
    }
    matches_at(condition, condition.path().segments(), body)
}

fn matches_at(condition: &FilterCondition, segments: &[String], map: &Map<String, Value>) -> bool {
    let Some((head, tail)) = segments.split_first() else {
        return false;
    };
    let stored = map.get(head);
    if tail.is_empty() {
        return apply(condition, stored);
    }
    match stored {
        Some(Value::Object(nested)) => matches_at(condition, tail, nested),
        // a path through a missing or non-mapping value resolves to "absent"
        _ => apply(condition, None),
    }
}

fn apply(condition: &FilterCondition, stored: Option<&Value>) -> bool {
    let operand = match (condition.value(), stored) {
        (FilterValue::DateTime(_), Some(Value::String(raw))) => coerce_stored_timestamp(raw)
            .map(Operand::DateTime)
            .unwrap_or(Operand::Json(stored)),
        _ => Operand::Json(stored),
    };

    match condition.op() {
        FilterOp::Eq => equals(condition.value(), &operand),
        FilterOp::Ne => !equals(condition.value(), &operand),
        FilterOp::In => match (condition.value(), &operand) {
            (FilterValue::Json(Value::Array(items)), Operand::Json(v)) => {
                items.contains(v.unwrap_or(&Value::Null))
            }
            _ => false,
        },
        FilterOp::Iexact => text_test(condition, &operand, |stored, wanted| {
            stored.to_lowercase() == wanted.to_lowercase()
        }),
        FilterOp::Contains => {
            text_test(condition, &operand, |stored, wanted| stored.contains(wanted))
        }
        FilterOp::Icontains => text_test(condition, &operand, |stored, wanted| {
            stored.to_lowercase().contains(&wanted.to_lowercase())
        }),
        op => match compare(&operand, condition.value()) {
            Some(ordering) => match op {
                FilterOp::Gte => ordering != Ordering::Less,
                FilterOp::Gt => ordering == Ordering::Greater,
                FilterOp::Lte => ordering != Ordering::Greater,
                FilterOp::Lt => ordering == Ordering::Less,
                _ => false,
            },
            None => false,
        },
    }
}

/// Exact, type-sensitive equality. A missing field equals `null`.
fn equals(wanted: &FilterValue, operand: &Operand<'_>) -> bool {
    match (wanted, operand) {
        (FilterValue::Predicate(predicate), Operand::Json(v)) => predicate.call(*v),
        (FilterValue::Predicate(predicate), Operand::DateTime(_)) => predicate.call(None),
        (FilterValue::DateTime(w), Operand::DateTime(s)) => w == s,
        (FilterValue::DateTime(_), Operand::Json(_)) => false,
        (FilterValue::Json(w), Operand::Json(v)) => v.unwrap_or(&Value::Null) == w,
        (FilterValue::Json(_), Operand::DateTime(_)) => false,
    }
}

fn text_test(
    condition: &FilterCondition,
    operand: &Operand<'_>,
    test: impl Fn(&str, &str) -> bool,
) -> bool {
    match (condition.value(), operand) {
        (FilterValue::Json(Value::String(wanted)), Operand::Json(Some(Value::String(stored)))) => {
            test(stored, wanted)
        }
        _ => false,
    }
}

/// Ordering of stored vs wanted, defined only for number/number,
/// string/string and date/date pairs.
fn compare(operand: &Operand<'_>, wanted: &FilterValue) -> Option<Ordering> {
    match (operand, wanted) {
        (Operand::Json(Some(Value::Number(s))), FilterValue::Json(Value::Number(w))) => {
            s.as_f64()?.partial_cmp(&w.as_f64()?)
        }
        (Operand::Json(Some(Value::String(s))), FilterValue::Json(Value::String(w))) => {
            Some(s.as_str().cmp(w.as_str()))
        }
        (Operand::DateTime(s), FilterValue::DateTime(w)) => Some(s.cmp(w)),
        _ => None,
    }
}
