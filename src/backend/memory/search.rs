//! In-memory search store.
//!
//! Evaluates the subset of the boolean query language the translator emits:
//! `match_all`, `bool` (must / must_not / should), `term`, `terms`, `exists`,
//! `match`, `wildcard` and `range`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::backend::{SearchClient, SearchPage, SearchRequest};
use crate::config::SEARCH_ID_FIELD;
use crate::error_handling::BackendError;
use crate::projection::Record;

/// A call received by [`MemorySearchStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum SearchCall {
    Search { index: String, body: Value },
    OpenScroll { index: String, body: Value },
    Scroll { scroll_id: String },
    ClearScroll { scroll_id: String },
    Count { index: String, query: Value },
}

struct Cursor {
    remaining: Vec<Record>,
    page_size: usize,
}

#[derive(Default)]
struct Inner {
    calls: Vec<SearchCall>,
    cursors: HashMap<String, Cursor>,
    next_cursor: usize,
}

/// Search store holding one index in memory.
pub struct MemorySearchStore {
    index: String,
    documents: Vec<(String, Map<String, Value>)>,
    positions: HashMap<String, usize>,
    fail_on_call: Option<usize>,
    inner: Mutex<Inner>,
}

impl MemorySearchStore {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            documents: Vec::new(),
            positions: HashMap::new(),
            fail_on_call: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Adds or replaces a document under `id`.
    pub fn insert(&mut self, id: impl Into<String>, body: Value) {
        let id = id.into();
        let body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        match self.positions.get(&id) {
            Some(&at) => self.documents[at].1 = body,
            None => {
                self.positions.insert(id.clone(), self.documents.len());
                self.documents.push((id, body));
            }
        }
    }

    pub fn with_document(mut self, id: impl Into<String>, body: Value) -> Self {
        self.insert(id, body);
        self
    }

    pub fn with_documents<I, K>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = (K, Map<String, Value>)>,
        K: Into<String>,
    {
        for (id, body) in documents {
            self.insert(id, Value::Object(body));
        }
        self
    }

    /// The `n`-th call (0-based, any kind) fails.
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<SearchCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Scroll cursors opened and not yet cleared.
    pub async fn open_cursors(&self) -> usize {
        self.inner.lock().await.cursors.len()
    }

    async fn record(&self, call: SearchCall, operation: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;
        let position = inner.calls.len();
        inner.calls.push(call);
        if self.fail_on_call == Some(position) {
            return Err(BackendError::new(operation, "node disconnected"));
        }
        Ok(())
    }

    fn check_index(&self, index: &str, operation: &str) -> Result<(), BackendError> {
        if index != self.index {
            return Err(BackendError::new(
                operation,
                format!("index_not_found_exception: no such index [{index}]"),
            ));
        }
        Ok(())
    }

    /// Every matching hit, sorted and source-filtered.
    fn execute(&self, request: &SearchRequest) -> Result<Vec<Record>, BackendError> {
        let mut hits: Vec<(&String, &Map<String, Value>)> = Vec::new();
        for (id, body) in &self.documents {
            if query_matches(&request.query, id, body)? {
                hits.push((id, body));
            }
        }
        if !request.sort.is_empty() {
            let keys = sort_keys(&request.sort)?;
            hits.sort_by(|a, b| compare_hits(&keys, a, b));
        }
        Ok(hits
            .into_iter()
            .map(|(id, body)| {
                Record::new(
                    Some(Value::String(id.clone())),
                    Some(filter_source(body, request.source.as_deref())),
                )
            })
            .collect())
    }
}

impl SearchClient for MemorySearchStore {
    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchPage, BackendError> {
        let call = SearchCall::Search {
            index: index.to_string(),
            body: request.to_body(),
        };
        self.record(call, "search").await?;
        self.check_index(index, "search")?;

        let mut hits = self.execute(request)?;
        hits.truncate(request.size);
        Ok(SearchPage {
            hits,
            scroll_id: None,
        })
    }

    async fn open_scroll(
        &self,
        index: &str,
        request: &SearchRequest,
        _keep_alive: Duration,
    ) -> Result<SearchPage, BackendError> {
        let call = SearchCall::OpenScroll {
            index: index.to_string(),
            body: request.to_body(),
        };
        self.record(call, "search").await?;
        self.check_index(index, "search")?;

        let mut remaining = self.execute(request)?;
        let page_size = request.size.max(1);
        let rest = remaining.split_off(page_size.min(remaining.len()));

        let mut inner = self.inner.lock().await;
        let scroll_id = format!("scroll-{}", inner.next_cursor);
        inner.next_cursor += 1;
        inner.cursors.insert(
            scroll_id.clone(),
            Cursor {
                remaining: rest,
                page_size,
            },
        );
        Ok(SearchPage {
            hits: remaining,
            scroll_id: Some(scroll_id),
        })
    }

    async fn scroll(
        &self,
        scroll_id: &str,
        _keep_alive: Duration,
    ) -> Result<SearchPage, BackendError> {
        let call = SearchCall::Scroll {
            scroll_id: scroll_id.to_string(),
        };
        self.record(call, "scroll").await?;

        let mut inner = self.inner.lock().await;
        let Some(cursor) = inner.cursors.get_mut(scroll_id) else {
            return Err(BackendError::new(
                "scroll",
                format!("search_context_missing_exception: no search context found for id [{scroll_id}]"),
            ));
        };
        let take = cursor.page_size.min(cursor.remaining.len());
        let hits: Vec<Record> = cursor.remaining.drain(..take).collect();
        Ok(SearchPage {
            hits,
            scroll_id: Some(scroll_id.to_string()),
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), BackendError> {
        let call = SearchCall::ClearScroll {
            scroll_id: scroll_id.to_string(),
        };
        self.record(call, "clear_scroll").await?;
        self.inner.lock().await.cursors.remove(scroll_id);
        Ok(())
    }

    async fn count(&self, index: &str, query: &Value) -> Result<u64, BackendError> {
        let call = SearchCall::Count {
            index: index.to_string(),
            query: query.clone(),
        };
        self.record(call, "count").await?;
        self.check_index(index, "count")?;

        let mut total = 0u64;
        for (id, body) in &self.documents {
            if query_matches(query, id, body)? {
                total += 1;
            }
        }
        Ok(total)
    }
}

fn unsupported(what: impl std::fmt::Display) -> BackendError {
    BackendError::new("search", format!("parsing_exception: unsupported query [{what}]"))
}

/// Single `{name: body}` entry of a clause object.
fn single_entry(clause: &Value) -> Result<(&String, &Value), BackendError> {
    match clause.as_object() {
        Some(map) if map.len() == 1 => map.iter().next().ok_or_else(|| unsupported(clause)),
        _ => Err(unsupported(clause)),
    }
}

fn query_matches(query: &Value, id: &str, doc: &Map<String, Value>) -> Result<bool, BackendError> {
    let (kind, body) = single_entry(query)?;
    match kind.as_str() {
        "match_all" => Ok(true),
        "bool" => bool_matches(body, id, doc),
        "exists" => {
            let field = body
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| unsupported(query))?;
            Ok(field_value(field, id, doc).is_some_and(|v| match v {
                Value::Null => false,
                Value::Array(items) => !items.is_empty(),
                _ => true,
            }))
        }
        "term" => {
            let (field, wanted) = single_entry(body)?;
            Ok(term_matches(field_value(field, id, doc).as_ref(), wanted))
        }
        "terms" => {
            let (field, wanted) = single_entry(body)?;
            let wanted = wanted.as_array().ok_or_else(|| unsupported(query))?;
            let stored = field_value(field, id, doc);
            Ok(wanted.iter().any(|w| term_matches(stored.as_ref(), w)))
        }
        "match" => {
            let (field, wanted) = single_entry(body)?;
            Ok(field_value(field, id, doc).is_some_and(|stored| {
                any_value(&stored, |v| match (v, wanted) {
                    (Value::String(s), Value::String(w)) => s.to_lowercase() == w.to_lowercase(),
                    (s, w) => s == w,
                })
            }))
        }
        "wildcard" => {
            let (field, pattern) = single_entry(body)?;
            let pattern = pattern.as_str().ok_or_else(|| unsupported(query))?;
            let matcher = wildcard_regex(pattern)?;
            Ok(field_value(field, id, doc).is_some_and(|stored| {
                any_value(&stored, |v| v.as_str().is_some_and(|s| matcher.is_match(s)))
            }))
        }
        "range" => {
            let (field, bounds) = single_entry(body)?;
            let bounds = bounds.as_object().ok_or_else(|| unsupported(query))?;
            let Some(stored) = field_value(field, id, doc) else {
                return Ok(false);
            };
            for (bound, limit) in bounds {
                let ok = match (compare_scalars(&stored, limit), bound.as_str()) {
                    (Some(ordering), "gte") => ordering != Ordering::Less,
                    (Some(ordering), "gt") => ordering == Ordering::Greater,
                    (Some(ordering), "lte") => ordering != Ordering::Greater,
                    (Some(ordering), "lt") => ordering == Ordering::Less,
                    (None, "gte" | "gt" | "lte" | "lt") => false,
                    _ => return Err(unsupported(query)),
                };
                if !ok {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Err(unsupported(kind)),
    }
}

fn section<'a>(body: &'a Value, name: &str) -> &'a [Value] {
    body.get(name)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn bool_matches(body: &Value, id: &str, doc: &Map<String, Value>) -> Result<bool, BackendError> {
    for clause in section(body, "must") {
        if !query_matches(clause, id, doc)? {
            return Ok(false);
        }
    }
    for clause in section(body, "must_not") {
        if query_matches(clause, id, doc)? {
            return Ok(false);
        }
    }
    let should = section(body, "should");
    // `should` is optional when `must` is present, required otherwise
    if !should.is_empty() && section(body, "must").is_empty() {
        for clause in should {
            if query_matches(clause, id, doc)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    Ok(true)
}

/// Value at a dotted path; `_id` resolves to the document id.
fn field_value(field: &str, id: &str, doc: &Map<String, Value>) -> Option<Value> {
    if field == SEARCH_ID_FIELD {
        return Some(Value::String(id.to_string()));
    }
    let mut segments = field.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

/// Applies `test` to a scalar, or to each element of an array field.
fn any_value(stored: &Value, test: impl Fn(&Value) -> bool) -> bool {
    match stored {
        Value::Array(items) => items.iter().any(test),
        other => test(other),
    }
}

fn term_matches(stored: Option<&Value>, wanted: &Value) -> bool {
    stored.is_some_and(|v| any_value(v, |item| item == wanted))
}

fn wildcard_regex(pattern: &str) -> Result<Regex, BackendError> {
    let mut expr = String::from("^");
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            '\\' => {
                if let Some(literal) = chars.next() {
                    expr.push_str(&regex::escape(&literal.to_string()));
                }
            }
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| BackendError::new("search", e.to_string()))
}

fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn sort_keys(sort: &[Value]) -> Result<Vec<(String, bool)>, BackendError> {
    sort.iter()
        .map(|clause| {
            let (field, options) = single_entry(clause)?;
            let descending = options.get("order").and_then(Value::as_str) == Some("desc");
            Ok((field.clone(), descending))
        })
        .collect()
}

/// Missing values sort last in either direction.
fn compare_hits(
    keys: &[(String, bool)],
    a: &(&String, &Map<String, Value>),
    b: &(&String, &Map<String, Value>),
) -> Ordering {
    for (field, descending) in keys {
        let left = field_value(field, a.0, a.1).filter(|v| !v.is_null());
        let right = field_value(field, b.0, b.1).filter(|v| !v.is_null());
        let ordering = match (&left, &right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) => {
                let natural = compare_scalars(l, r).unwrap_or(Ordering::Equal);
                if *descending {
                    natural.reverse()
                } else {
                    natural
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Keeps only the `_source` includes, preserving their nesting.
fn filter_source(body: &Map<String, Value>, includes: Option<&[String]>) -> Map<String, Value> {
    let Some(includes) = includes else {
        return body.clone();
    };
    let mut filtered = Map::new();
    for include in includes {
        let segments: Vec<&str> = include.split('.').collect();
        copy_path(body, &segments, &mut filtered);
    }
    filtered
}

fn copy_path(source: &Map<String, Value>, segments: &[&str], target: &mut Map<String, Value>) {
    let Some((head, tail)) = segments.split_first() else {
        return;
    };
    let Some(value) = source.get(*head) else {
        return;
    };
    if tail.is_empty() {
        target.insert((*head).to_string(), value.clone());
        return;
    }
    if let Value::Object(nested) = value {
        let slot = target
            .entry((*head).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(slot) = slot {
            copy_path(nested, tail, slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(body: Value) -> Map<String, Value> {
        body.as_object().cloned().unwrap()
    }

    fn matches(query: Value, body: Value) -> bool {
        query_matches(&query, "doc-1", &doc(body)).unwrap()
    }

    #[test]
    fn test_term_and_terms() {
        assert!(matches(json!({"term": {"a": 1}}), json!({"a": 1})));
        assert!(matches(json!({"term": {"tags": "x"}}), json!({"tags": ["x", "y"]})));
        assert!(matches(json!({"terms": {"_id": ["doc-1"]}}), json!({})));
        assert!(!matches(json!({"terms": {"a": [2, 3]}}), json!({"a": 1})));
    }

    #[test]
    fn test_bool_should_semantics() {
        let should_only = json!({"bool": {"should": [{"term": {"a": 1}}, {"term": {"a": 2}}]}});
        assert!(matches(should_only.clone(), json!({"a": 2})));
        assert!(!matches(should_only, json!({"a": 3})));

        let with_must = json!({"bool": {"must": [{"exists": {"field": "b"}}], "should": [{"term": {"a": 1}}]}});
        assert!(matches(with_must, json!({"a": 9, "b": 0})));
    }

    #[test]
    fn test_exists_nested_and_null() {
        assert!(matches(json!({"exists": {"field": "m.c"}}), json!({"m": {"c": "IN"}})));
        assert!(!matches(json!({"exists": {"field": "m.c"}}), json!({"m": {"c": null}})));
        assert!(!matches(json!({"exists": {"field": "m.c"}}), json!({"m": 3})));
    }

    #[test]
    fn test_wildcard_match_and_range() {
        assert!(matches(json!({"wildcard": {"n": "*sh*"}}), json!({"n": "asha"})));
        assert!(!matches(json!({"wildcard": {"n": "*SH*"}}), json!({"n": "asha"})));
        assert!(matches(json!({"wildcard": {"n": r"*a\*b*"}}), json!({"n": "xa*by"})));
        assert!(!matches(json!({"wildcard": {"n": r"*a\*b*"}}), json!({"n": "axxb"})));
        assert!(matches(json!({"match": {"n": "ASHA"}}), json!({"n": "asha"})));
        assert!(matches(json!({"range": {"age": {"gte": 18, "lt": 30}}}), json!({"age": 18})));
        assert!(!matches(json!({"range": {"age": {"gte": 18}}}), json!({"age": "old"})));
    }

    #[test]
    fn test_unknown_clause_is_error() {
        let err = query_matches(&json!({"fuzzy": {"a": "b"}}), "x", &Map::new()).unwrap_err();
        assert_eq!(err.operation, "search");
    }

    #[test]
    fn test_source_filter_keeps_nesting() {
        let body = doc(json!({"a": 1, "m": {"c": "IN", "d": 2}, "z": 0}));
        let filtered = filter_source(&body, Some(&["a".to_string(), "m.c".to_string()]));
        assert_eq!(Value::Object(filtered), json!({"a": 1, "m": {"c": "IN"}}));
        assert!(filter_source(&body, Some(&[])).is_empty());
    }
}
