//! In-memory stores.
//!
//! Both stores keep documents in insertion order and log every request they
//! receive, so callers can check how many physical requests a retrieval
//! issued. They back the CLI's `--source` mode and the test suite.

mod kv;
mod search;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error_handling::ResourceError;

// Re-export public API
pub use kv::{KvRequest, MemoryKeyValueStore};
pub use search::{MemorySearchStore, SearchCall};

/// Reads a JSON-lines file into `(key, document)` pairs.
///
/// The key is taken from `key_field` (strings as-is, other scalars in their
/// JSON form). Documents without it are keyed by their 1-based line number.
/// Blank lines are skipped.
///
/// # Errors
///
/// `ResourceError::Open`/`Read` for I/O failures and `ResourceError::Parse`
/// for a line that is not a JSON object.
pub fn read_jsonl_documents(
    path: &Path,
    key_field: &str,
) -> Result<Vec<(String, Map<String, Value>)>, ResourceError> {
    let file = File::open(path).map_err(|source| ResourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut documents = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| ResourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let parse_error = |source| ResourceError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        };
        let body: Map<String, Value> = serde_json::from_str(&line).map_err(parse_error)?;
        let key = match body.get(key_field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => (index + 1).to_string(),
            Some(other) => other.to_string(),
        };
        documents.push((key, body));
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_jsonl_documents() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"id": "a", "n": 1}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"id": 7, "n": 2}}"#).unwrap();
        writeln!(file, r#"{{"n": 3}}"#).unwrap();

        let docs = read_jsonl_documents(file.path(), "id").unwrap();
        let keys: Vec<&str> = docs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a", "7", "4"]);
        assert_eq!(docs[0].1["n"], 1);
    }

    #[test]
    fn test_read_jsonl_rejects_non_object() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"id": "a"}}"#).unwrap();
        writeln!(file, "[1, 2]").unwrap();

        let err = read_jsonl_documents(file.path(), "id").unwrap_err();
        assert!(matches!(err, ResourceError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_read_jsonl_missing_file() {
        let err = read_jsonl_documents(Path::new("/nonexistent/docs.jsonl"), "id").unwrap_err();
        assert!(matches!(err, ResourceError::Open { .. }));
    }
}
