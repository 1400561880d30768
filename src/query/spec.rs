//! Query description built by the caller.
//!
//! `QuerySpec` is a mutable builder: every call replaces the corresponding
//! part of the query and returns `&mut Self` for chaining. Nothing here does
//! I/O.

use super::condition::{FieldPath, FilterCondition};

/// One sort key. A leading `-` in the raw form means descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    field: FieldPath,
    descending: bool,
}

impl SortKey {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(rest) => Self {
                field: FieldPath::parse(rest),
                descending: true,
            },
            None => Self {
                field: FieldPath::parse(raw),
                descending: false,
            },
        }
    }

    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }
}

/// Everything a caller wants from a retrieval: conditions, projection and order.
///
/// `filter`, `exclude`, `should`, `select` and `sort` each REPLACE what an
/// earlier call set. Calling `filter` twice keeps only the second set; build
/// the full condition list first and pass it once.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    must: Vec<FilterCondition>,
    must_not: Vec<FilterCondition>,
    should: Vec<FilterCondition>,
    select: Vec<FieldPath>,
    sort: Vec<SortKey>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the conditions every kept record must satisfy.
    pub fn filter<I>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = FilterCondition>,
    {
        self.must = conditions.into_iter().collect();
        self
    }

    /// Sets the conditions that drop a record when any of them matches.
    pub fn exclude<I>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = FilterCondition>,
    {
        self.must_not = conditions.into_iter().collect();
        self
    }

    /// Sets optional `should` clauses (search backend only).
    pub fn should<I>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = FilterCondition>,
    {
        self.should = conditions.into_iter().collect();
        self
    }

    /// Sets the projected paths (`a__b__c` for nested fields, `pk` for the key).
    pub fn select<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select = paths
            .into_iter()
            .map(|p| FieldPath::parse(p.as_ref()))
            .collect();
        self
    }

    /// Sets the sort keys (`-field` for descending).
    pub fn sort<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sort = keys.into_iter().map(|k| SortKey::parse(k.as_ref())).collect();
        self
    }

    pub fn filters(&self) -> &[FilterCondition] {
        &self.must
    }

    pub fn exclusions(&self) -> &[FilterCondition] {
        &self.must_not
    }

    pub fn alternatives(&self) -> &[FilterCondition] {
        &self.should
    }

    pub fn selected(&self) -> &[FieldPath] {
        &self.select
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    /// True if any filter, exclusion or should condition is set.
    pub fn has_conditions(&self) -> bool {
        !(self.must.is_empty() && self.must_not.is_empty() && self.should.is_empty())
    }

    pub fn selects_primary_key(&self) -> bool {
        self.select.iter().any(FieldPath::is_primary_key)
    }

    /// Column names in select order, as written by the caller.
    pub fn select_names(&self) -> Vec<String> {
        self.select.iter().map(ToString::to_string).collect()
    }

    /// Top-level fields a backend must return for projection and client-side
    /// filtering, or `None` when whole records are fetched.
    ///
    /// A pk-only select with no field conditions also fetches whole records:
    /// an empty field list would return empty bodies, which read as missing.
    pub fn fetched_fields(&self) -> Option<Vec<String>> {
        if self.select.is_empty() {
            return None;
        }
        let mut fields: Vec<String> = Vec::new();
        let roots = self
            .select
            .iter()
            .chain(self.must.iter().map(FilterCondition::path))
            .chain(self.must_not.iter().map(FilterCondition::path))
            .filter(|path| !path.is_primary_key())
            .map(FieldPath::root);
        for root in roots {
            if !fields.iter().any(|f| f == root) {
                fields.push(root.to_string());
            }
        }
        if fields.is_empty() {
            return None;
        }
        Some(fields)
    }

    /// Copy of this spec with one more `must` condition appended.
    pub(crate) fn with_extra_filter(&self, condition: FilterCondition) -> QuerySpec {
        let mut spec = self.clone();
        spec.must.push(condition);
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(key: &str, value: serde_json::Value) -> FilterCondition {
        FilterCondition::parse(key, value).unwrap()
    }

    #[test]
    fn test_filter_replaces_previous_call() {
        let mut spec = QuerySpec::new();
        spec.filter([cond("a", json!(1))]);
        spec.filter([cond("b", json!(2))]);
        assert_eq!(spec.filters().len(), 1);
        assert_eq!(spec.filters()[0].key(), "b");
    }

    #[test]
    fn test_chaining() {
        let mut spec = QuerySpec::new();
        spec.filter([cond("status", json!("active"))])
            .exclude([cond("age__lt", json!(18))])
            .select(["pk", "name", "meta__country"])
            .sort(["-age", "name"]);

        assert_eq!(spec.filters().len(), 1);
        assert_eq!(spec.exclusions().len(), 1);
        assert!(spec.alternatives().is_empty());
        assert_eq!(spec.select_names(), vec!["pk", "name", "meta__country"]);
        assert!(spec.selects_primary_key());
        assert!(spec.sort_keys()[0].is_descending());
        assert_eq!(spec.sort_keys()[0].field().to_string(), "age");
        assert!(!spec.sort_keys()[1].is_descending());
        assert!(spec.has_conditions());
    }

    #[test]
    fn test_fetched_fields_union_of_select_and_conditions() {
        let mut spec = QuerySpec::new();
        spec.select(["pk", "name", "meta__country", "meta__city"])
            .filter([cond("status", json!("active"))])
            .exclude([cond("age__lt", json!(18)), cond("name", json!("x"))]);

        assert_eq!(
            spec.fetched_fields(),
            Some(vec![
                "name".to_string(),
                "meta".to_string(),
                "status".to_string(),
                "age".to_string(),
            ])
        );
    }

    #[test]
    fn test_fetched_fields_none_without_select() {
        let mut spec = QuerySpec::new();
        spec.filter([cond("status", json!("active"))]);
        assert_eq!(spec.fetched_fields(), None);
    }

    #[test]
    fn test_fetched_fields_pk_only_select_fetches_whole_records() {
        let mut spec = QuerySpec::new();
        spec.select(["pk"]);
        assert_eq!(spec.fetched_fields(), None);

        spec.filter([cond("pk__in", json!(["a"]))]);
        assert_eq!(spec.fetched_fields(), None);

        spec.filter([cond("age__gt", json!(1))]);
        assert_eq!(spec.fetched_fields(), Some(vec!["age".to_string()]));
    }

    #[test]
    fn test_with_extra_filter_leaves_original_untouched() {
        let mut spec = QuerySpec::new();
        spec.filter([cond("a", json!(1))]);
        let extended = spec.with_extra_filter(cond("pk__in", json!(["k"])));
        assert_eq!(spec.filters().len(), 1);
        assert_eq!(extended.filters().len(), 2);
    }
}
