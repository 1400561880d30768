//! Native query clauses and their JSON form.

use serde_json::{json, Map, Value};

/// Bound of a range clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Gte,
    Gt,
    Lte,
    Lt,
}

impl RangeBound {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeBound::Gte => "gte",
            RangeBound::Gt => "gt",
            RangeBound::Lte => "lte",
            RangeBound::Lt => "lt",
        }
    }
}

/// One clause of the search backend's boolean query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Exact term match
    Term { field: String, value: Value },
    /// Membership in a set of terms
    Terms { field: String, values: Vec<Value> },
    /// Field is present
    Exists { field: String },
    /// Analyzed full-text match
    Match { field: String, value: Value },
    /// Wildcard pattern (`*` any run)
    Wildcard { field: String, pattern: String },
    /// Single-sided range
    Range {
        field: String,
        bound: RangeBound,
        value: Value,
    },
    /// Negation
    Not(Box<Clause>),
    /// At least one of
    AnyOf(Vec<Clause>),
}

impl Clause {
    pub fn to_json(&self) -> Value {
        match self {
            Clause::Term { field, value } => json!({ "term": { field: value } }),
            Clause::Terms { field, values } => json!({ "terms": { field: values } }),
            Clause::Exists { field } => json!({ "exists": { "field": field } }),
            Clause::Match { field, value } => json!({ "match": { field: value } }),
            Clause::Wildcard { field, pattern } => json!({ "wildcard": { field: pattern } }),
            Clause::Range {
                field,
                bound,
                value,
            } => json!({ "range": { field: { bound.as_str(): value } } }),
            Clause::Not(inner) => json!({ "bool": { "must_not": [inner.to_json()] } }),
            Clause::AnyOf(clauses) => {
                let should: Vec<Value> = clauses.iter().map(Clause::to_json).collect();
                json!({ "bool": { "should": should } })
            }
        }
    }
}

/// Compiled boolean query: `must`, `must_not` and `should` clause lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeQuery {
    pub must: Vec<Clause>,
    pub must_not: Vec<Clause>,
    pub should: Vec<Clause>,
}

impl NativeQuery {
    /// JSON form, e.g. `{"bool": {"must": [...], "must_not": [...], "should": [...]}}`.
    /// Empty lists are omitted; no clauses at all yields `match_all`.
    pub fn to_json(&self) -> Value {
        if self.must.is_empty() && self.must_not.is_empty() && self.should.is_empty() {
            return json!({ "match_all": {} });
        }
        let mut bool_query = Map::new();
        for (name, clauses) in [
            ("must", &self.must),
            ("must_not", &self.must_not),
            ("should", &self.should),
        ] {
            if !clauses.is_empty() {
                let rendered: Vec<Value> = clauses.iter().map(Clause::to_json).collect();
                bool_query.insert(name.to_string(), Value::Array(rendered));
            }
        }
        json!({ "bool": bool_query })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_json_shapes() {
        let term = Clause::Term {
            field: "status".into(),
            value: json!("active"),
        };
        assert_eq!(term.to_json(), json!({"term": {"status": "active"}}));

        let range = Clause::Range {
            field: "age".into(),
            bound: RangeBound::Gte,
            value: json!(18),
        };
        assert_eq!(range.to_json(), json!({"range": {"age": {"gte": 18}}}));

        let not_exists = Clause::Not(Box::new(Clause::Exists {
            field: "deleted_at".into(),
        }));
        assert_eq!(
            not_exists.to_json(),
            json!({"bool": {"must_not": [{"exists": {"field": "deleted_at"}}]}})
        );
    }

    #[test]
    fn test_empty_query_is_match_all() {
        assert_eq!(NativeQuery::default().to_json(), json!({"match_all": {}}));
    }

    #[test]
    fn test_empty_sections_omitted() {
        let query = NativeQuery {
            must: vec![Clause::Exists { field: "a".into() }],
            ..Default::default()
        };
        assert_eq!(
            query.to_json(),
            json!({"bool": {"must": [{"exists": {"field": "a"}}]}})
        );
    }
}
