// Shared test helpers for building in-memory stores and reading export files.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::path::Path;

use serde_json::{json, Value};

use dbq::backend::memory::{MemoryKeyValueStore, MemorySearchStore};
use dbq::config::SearchSettings;
use dbq::{Collection, KeyValueSource, Objects, SearchSource};

/// Namespace and set used by every key/value test.
#[allow(dead_code)] // Used by other test files
pub fn users_collection() -> Collection {
    Collection::new("test", "users")
}

/// Five users with a mix of statuses, ages and nested fields.
#[allow(dead_code)]
pub fn sample_users() -> Vec<(&'static str, Value)> {
    vec![
        (
            "a",
            json!({"name": "Asha", "age": 31, "status": "active", "meta": {"country": "IN"}}),
        ),
        (
            "b",
            json!({"name": "Ben", "age": 17, "status": "active", "meta": {"country": "US"}}),
        ),
        (
            "c",
            json!({"name": "Chen", "age": 45, "status": "closed", "meta": {"country": "IN"}}),
        ),
        ("d", json!({"name": "Dara", "age": 28, "status": "active"})),
        (
            "e",
            json!({"name": "Eli", "age": 52, "status": "active", "meta": {"country": null}}),
        ),
    ]
}

/// `n` numbered users, keyed `u0`, `u1`, ...
#[allow(dead_code)]
pub fn numbered_users(n: usize) -> Vec<(String, Value)> {
    (0..n)
        .map(|i| (format!("u{i}"), json!({"n": i, "even": i % 2 == 0})))
        .collect()
}

/// Key/value store preloaded with [`sample_users`].
#[allow(dead_code)]
pub fn kv_store() -> MemoryKeyValueStore {
    let mut store = MemoryKeyValueStore::new(users_collection());
    for (key, body) in sample_users() {
        store.insert(key, body);
    }
    store
}

/// Query builder over a key/value store.
#[allow(dead_code)]
pub fn kv_objects(store: MemoryKeyValueStore) -> Objects<KeyValueSource<MemoryKeyValueStore>> {
    Objects::new(KeyValueSource::new(store, users_collection()))
}

/// Search store preloaded with [`sample_users`] in index `users`.
#[allow(dead_code)]
pub fn search_store() -> MemorySearchStore {
    let mut store = MemorySearchStore::new("users");
    for (id, body) in sample_users() {
        store.insert(id, body);
    }
    store
}

/// Query builder over a search store with the default settings.
#[allow(dead_code)]
pub fn search_objects(store: MemorySearchStore) -> Objects<SearchSource<MemorySearchStore>> {
    Objects::new(SearchSource::new(store, "users"))
}

/// Query builder over a search store with a small page size, so scrolling
/// kicks in with a handful of documents.
#[allow(dead_code)]
pub fn paged_search_objects(
    store: MemorySearchStore,
    page_size: usize,
) -> Objects<SearchSource<MemorySearchStore>> {
    let settings = SearchSettings {
        page_size,
        ..SearchSettings::default()
    };
    Objects::new(SearchSource::new(store, "users").with_settings(settings))
}

/// Reads a JSON-lines export back into values.
#[allow(dead_code)]
pub fn read_json_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .expect("Failed to read export file")
        .lines()
        .map(|line| serde_json::from_str(line).expect("Export line is not JSON"))
        .collect()
}
