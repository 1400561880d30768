//! Query translation for the search backend.
//!
//! Turns a [`QuerySpec`] into the backend's boolean query, sort list and
//! `_source` filter. Translation is pure and deterministic: the same spec
//! always yields the same JSON.

mod clause;

use serde_json::{json, Value};

use crate::config::SEARCH_ID_FIELD;
use crate::error_handling::ConfigurationError;
use crate::query::{FieldPath, FilterCondition, FilterOp, FilterValue, QuerySpec};

// Re-export public API
pub use clause::{Clause, NativeQuery, RangeBound};

/// Timestamp layout sent to the search backend for date values.
pub const SEARCH_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Compiles the query's filter, exclude and should conditions.
///
/// # Errors
///
/// `NotTranslatable` for callable predicates and `icontains`, which have no
/// server-side form.
pub fn translate(spec: &QuerySpec) -> Result<NativeQuery, ConfigurationError> {
    Ok(NativeQuery {
        must: translate_all(spec.filters())?,
        must_not: translate_all(spec.exclusions())?,
        should: translate_all(spec.alternatives())?,
    })
}

fn translate_all(conditions: &[FilterCondition]) -> Result<Vec<Clause>, ConfigurationError> {
    conditions.iter().map(translate_condition).collect()
}

/// Compiles one condition into a clause.
pub fn translate_condition(condition: &FilterCondition) -> Result<Clause, ConfigurationError> {
    let field = search_field(condition.path());
    let value = match condition.value() {
        FilterValue::Json(value) => value.clone(),
        FilterValue::DateTime(dt) => Value::String(dt.format(SEARCH_DATE_FORMAT).to_string()),
        FilterValue::Predicate(_) => {
            return Err(ConfigurationError::NotTranslatable {
                condition: condition.key(),
                reason: "callable predicates are evaluated client-side only",
            })
        }
    };

    let clause = match condition.op() {
        FilterOp::Eq if value.is_null() => Clause::Not(Box::new(Clause::Exists { field })),
        FilterOp::Eq => Clause::Term { field, value },
        FilterOp::Ne if value.is_null() => Clause::Exists { field },
        FilterOp::Ne => Clause::Not(Box::new(Clause::Term { field, value })),
        FilterOp::In => {
            let items = match value {
                Value::Array(items) => items,
                other => vec![other],
            };
            let (nulls, values): (Vec<Value>, Vec<Value>) =
                items.into_iter().partition(Value::is_null);
            if nulls.is_empty() {
                Clause::Terms { field, values }
            } else {
                let mut alternatives = vec![Clause::Not(Box::new(Clause::Exists {
                    field: field.clone(),
                }))];
                if !values.is_empty() {
                    alternatives.push(Clause::Terms { field, values });
                }
                Clause::AnyOf(alternatives)
            }
        }
        FilterOp::Iexact => Clause::Match { field, value },
        FilterOp::Contains => Clause::Wildcard {
            pattern: format!("*{}*", escape_wildcard(value.as_str().unwrap_or_default())),
            field,
        },
        FilterOp::Icontains => {
            return Err(ConfigurationError::NotTranslatable {
                condition: condition.key(),
                reason: "case-insensitive substring match has no native form",
            })
        }
        FilterOp::Gte => range(field, RangeBound::Gte, value),
        FilterOp::Gt => range(field, RangeBound::Gt, value),
        FilterOp::Lte => range(field, RangeBound::Lte, value),
        FilterOp::Lt => range(field, RangeBound::Lt, value),
    };
    Ok(clause)
}

/// Backslash-escapes the wildcard metacharacters so `text` matches literally.
fn escape_wildcard(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn range(field: String, bound: RangeBound, value: Value) -> Clause {
    Clause::Range {
        field,
        bound,
        value,
    }
}

/// Dotted field name; the `pk` path maps to the document id.
pub fn search_field(path: &FieldPath) -> String {
    if path.is_primary_key() {
        SEARCH_ID_FIELD.to_string()
    } else {
        path.joined(".")
    }
}

/// Sort clauses, e.g. `-age` becomes `{"age": {"order": "desc"}}`.
pub fn sort_clauses(spec: &QuerySpec) -> Vec<Value> {
    spec.sort_keys()
        .iter()
        .map(|key| {
            let order = if key.is_descending() { "desc" } else { "asc" };
            json!({ search_field(key.field()): { "order": order } })
        })
        .collect()
}

/// `_source` includes for the selected paths, or `None` to fetch everything.
/// The primary key travels as the document id, never as a source field.
pub fn source_fields(spec: &QuerySpec) -> Option<Vec<String>> {
    if spec.selected().is_empty() {
        return None;
    }
    let mut fields: Vec<String> = Vec::new();
    for path in spec.selected().iter().filter(|p| !p.is_primary_key()) {
        let name = path.joined(".");
        if !fields.contains(&name) {
            fields.push(name);
        }
    }
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::date_filter;

    fn cond(key: &str, value: Value) -> FilterCondition {
        FilterCondition::parse(key, value).unwrap()
    }

    fn filtered(conditions: Vec<FilterCondition>) -> QuerySpec {
        let mut spec = QuerySpec::new();
        spec.filter(conditions);
        spec
    }

    #[test]
    fn test_in_with_null_becomes_disjunction() {
        let spec = filtered(vec![cond("country__in", json!(["IN", null]))]);
        let query = translate(&spec).unwrap();
        assert_eq!(
            query.to_json(),
            json!({"bool": {"must": [{"bool": {"should": [
                {"bool": {"must_not": [{"exists": {"field": "country"}}]}},
                {"terms": {"country": ["IN"]}}
            ]}}]}})
        );
    }

    #[test]
    fn test_in_with_only_null() {
        let clause = translate_condition(&cond("country__in", json!([null]))).unwrap();
        assert_eq!(
            clause,
            Clause::AnyOf(vec![Clause::Not(Box::new(Clause::Exists {
                field: "country".into()
            }))])
        );
    }

    #[test]
    fn test_eq_and_ne_null() {
        assert_eq!(
            translate_condition(&cond("deleted", json!(null))).unwrap(),
            Clause::Not(Box::new(Clause::Exists {
                field: "deleted".into()
            }))
        );
        assert_eq!(
            translate_condition(&cond("deleted__ne", json!(null))).unwrap(),
            Clause::Exists {
                field: "deleted".into()
            }
        );
        assert_eq!(
            translate_condition(&cond("status__ne", json!("active")))
                .unwrap()
                .to_json(),
            json!({"bool": {"must_not": [{"term": {"status": "active"}}]}})
        );
    }

    #[test]
    fn test_nested_path_is_dotted_and_pk_is_id() {
        let spec = filtered(vec![
            cond("meta__geo__country", json!("IN")),
            cond("pk__in", json!(["a", "b"])),
        ]);
        let body = translate(&spec).unwrap().to_json();
        assert_eq!(body["bool"]["must"][0], json!({"term": {"meta.geo.country": "IN"}}));
        assert_eq!(body["bool"]["must"][1], json!({"terms": {"_id": ["a", "b"]}}));
    }

    #[test]
    fn test_text_and_range_operators() {
        assert_eq!(
            translate_condition(&cond("name__iexact", json!("Asha")))
                .unwrap()
                .to_json(),
            json!({"match": {"name": "Asha"}})
        );
        assert_eq!(
            translate_condition(&cond("name__contains", json!("sh")))
                .unwrap()
                .to_json(),
            json!({"wildcard": {"name": "*sh*"}})
        );
        assert_eq!(
            translate_condition(&cond("name__contains", json!(r"5*?\x")))
                .unwrap()
                .to_json(),
            json!({"wildcard": {"name": r"*5\*\?\\x*"}})
        );
        assert_eq!(
            translate_condition(&cond("age__lt", json!(18)))
                .unwrap()
                .to_json(),
            json!({"range": {"age": {"lt": 18}}})
        );
    }

    #[test]
    fn test_date_values_are_formatted() {
        let since = date_filter("2021-03-04 05:06:07").unwrap();
        let condition = FilterCondition::parse("created__gte", since).unwrap();
        assert_eq!(
            translate_condition(&condition).unwrap().to_json(),
            json!({"range": {"created": {"gte": "2021-03-04T05:06:07"}}})
        );
    }

    #[test]
    fn test_icontains_is_not_translatable() {
        let err = translate(&filtered(vec![cond("name__icontains", json!("a"))])).unwrap_err();
        assert!(matches!(err, ConfigurationError::NotTranslatable { .. }));
    }

    #[test]
    fn test_predicate_is_not_translatable() {
        let spec = filtered(vec![FilterCondition::predicate("age", |_| true).unwrap()]);
        assert!(matches!(
            translate(&spec),
            Err(ConfigurationError::NotTranslatable { .. })
        ));
    }

    #[test]
    fn test_exclude_and_should_sections() {
        let mut spec = QuerySpec::new();
        spec.exclude([cond("status", json!("deleted"))])
            .should([cond("tier", json!("gold")), cond("tier", json!("silver"))]);
        let body = translate(&spec).unwrap().to_json();
        assert_eq!(body["bool"]["must_not"], json!([{"term": {"status": "deleted"}}]));
        assert_eq!(body["bool"]["should"].as_array().unwrap().len(), 2);
        assert!(body["bool"].get("must").is_none());
    }

    #[test]
    fn test_translation_is_deterministic() {
        let mut spec = QuerySpec::new();
        spec.filter([
            cond("a__in", json!([1, null, 2])),
            cond("b__gte", json!(3)),
            cond("c__contains", json!("x")),
        ])
        .exclude([cond("d", json!(null))]);
        let first = translate(&spec).unwrap().to_json();
        for _ in 0..5 {
            assert_eq!(translate(&spec).unwrap().to_json(), first);
        }
    }

    #[test]
    fn test_sort_and_source() {
        let mut spec = QuerySpec::new();
        spec.sort(["-age", "meta__name"])
            .select(["pk", "name", "meta__geo", "name"]);
        assert_eq!(
            sort_clauses(&spec),
            vec![
                json!({"age": {"order": "desc"}}),
                json!({"meta.name": {"order": "asc"}})
            ]
        );
        assert_eq!(
            source_fields(&spec),
            Some(vec!["name".to_string(), "meta.geo".to_string()])
        );
        assert_eq!(source_fields(&QuerySpec::new()), None);
    }
}
