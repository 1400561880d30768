//! In-memory key/value store.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::backend::keyvalue::SETS_INFO_COMMAND;
use crate::backend::{Collection, KeyValueClient, NodeInfo, ScanFlow};
use crate::config::{ReadPolicy, ScanPolicy};
use crate::error_handling::BackendError;
use crate::projection::Record;

/// A request received by [`MemoryKeyValueStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvRequest {
    GetMany {
        keys: Vec<String>,
        bins: Option<Vec<String>>,
    },
    Scan {
        bins: Option<Vec<String>>,
    },
    Info(String),
}

#[derive(Debug, Default)]
struct Inner {
    requests: Vec<KvRequest>,
    get_many_calls: usize,
}

/// Key/value store holding one set in memory.
#[derive(Debug)]
pub struct MemoryKeyValueStore {
    collection: Collection,
    records: Vec<(String, Map<String, Value>)>,
    positions: HashMap<String, usize>,
    nodes: usize,
    store_keys: bool,
    fail_scan_after: Option<usize>,
    fail_get_many_call: Option<usize>,
    inner: Mutex<Inner>,
}

impl MemoryKeyValueStore {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            records: Vec::new(),
            positions: HashMap::new(),
            nodes: 1,
            store_keys: true,
            fail_scan_after: None,
            fail_get_many_call: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Adds or replaces a record. Non-object bodies are stored as empty.
    pub fn insert(&mut self, key: impl Into<String>, body: Value) {
        let key = key.into();
        let body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        match self.positions.get(&key) {
            Some(&at) => self.records[at].1 = body,
            None => {
                self.positions.insert(key.clone(), self.records.len());
                self.records.push((key, body));
            }
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_record(mut self, key: impl Into<String>, body: Value) -> Self {
        self.insert(key, body);
        self
    }

    pub fn with_records<I, K>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = (K, Map<String, Value>)>,
        K: Into<String>,
    {
        for (key, body) in records {
            self.insert(key, Value::Object(body));
        }
        self
    }

    /// Spreads the set's object counter over `nodes` info responses.
    pub fn with_nodes(mut self, nodes: usize) -> Self {
        self.nodes = nodes.max(1);
        self
    }

    /// Scans deliver records without their key, like a set written without
    /// stored user keys.
    pub fn without_stored_keys(mut self) -> Self {
        self.store_keys = false;
        self
    }

    /// The scan fails after delivering `n` records.
    pub fn fail_scan_after(mut self, n: usize) -> Self {
        self.fail_scan_after = Some(n);
        self
    }

    /// The `n`-th multi-get (0-based) fails.
    pub fn fail_get_many_call(mut self, n: usize) -> Self {
        self.fail_get_many_call = Some(n);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<KvRequest> {
        self.inner.lock().await.requests.clone()
    }

    /// Multi-get requests received so far.
    pub async fn get_many_requests(&self) -> Vec<Vec<String>> {
        self.inner
            .lock()
            .await
            .requests
            .iter()
            .filter_map(|r| match r {
                KvRequest::GetMany { keys, .. } => Some(keys.clone()),
                _ => None,
            })
            .collect()
    }

    fn check_collection(&self, collection: &Collection, operation: &str) -> Result<(), BackendError> {
        if collection != &self.collection {
            return Err(BackendError::new(
                operation,
                format!("unknown namespace-set {collection}"),
            ));
        }
        Ok(())
    }
}

fn restrict(body: &Map<String, Value>, bins: Option<&[String]>) -> Map<String, Value> {
    match bins {
        None => body.clone(),
        Some(bins) => body
            .iter()
            .filter(|(name, _)| bins.iter().any(|b| b == *name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    }
}

impl KeyValueClient for MemoryKeyValueStore {
    async fn get_many(
        &self,
        collection: &Collection,
        keys: &[String],
        bins: Option<&[String]>,
        _policy: &ReadPolicy,
    ) -> Result<Vec<Record>, BackendError> {
        let call = {
            let mut inner = self.inner.lock().await;
            inner.requests.push(KvRequest::GetMany {
                keys: keys.to_vec(),
                bins: bins.map(<[String]>::to_vec),
            });
            inner.get_many_calls += 1;
            inner.get_many_calls - 1
        };
        self.check_collection(collection, "get_many")?;
        if self.fail_get_many_call == Some(call) {
            return Err(BackendError::new("get_many", "timeout"));
        }

        let records = keys
            .iter()
            .map(|key| match self.positions.get(key) {
                Some(&at) => Record::new(
                    Some(Value::String(key.clone())),
                    Some(restrict(&self.records[at].1, bins)),
                ),
                None => Record::missing(key.clone()),
            })
            .collect();
        Ok(records)
    }

    async fn scan(
        &self,
        collection: &Collection,
        bins: Option<&[String]>,
        _policy: &ScanPolicy,
        visitor: &mut dyn FnMut(Record) -> ScanFlow,
    ) -> Result<(), BackendError> {
        self.inner.lock().await.requests.push(KvRequest::Scan {
            bins: bins.map(<[String]>::to_vec),
        });
        self.check_collection(collection, "scan")?;

        for (delivered, (key, body)) in self.records.iter().enumerate() {
            if self.fail_scan_after == Some(delivered) {
                return Err(BackendError::new("scan", "connection reset by node"));
            }
            let key = self.store_keys.then(|| Value::String(key.clone()));
            if visitor(Record::new(key, Some(restrict(body, bins)))) == ScanFlow::Stop {
                break;
            }
        }
        Ok(())
    }

    async fn info(&self, command: &str) -> Result<Vec<NodeInfo>, BackendError> {
        self.inner
            .lock()
            .await
            .requests
            .push(KvRequest::Info(command.to_string()));
        if command != SETS_INFO_COMMAND {
            return Ok(Vec::new());
        }

        let total = self.records.len();
        let share = total / self.nodes;
        let nodes = (0..self.nodes)
            .map(|i| {
                let objects = if i == 0 {
                    share + total % self.nodes
                } else {
                    share
                };
                NodeInfo {
                    node: format!("BB9{i:013X}"),
                    response: format!(
                        "ns={}:set={}:objects={}:tombstones=0:memory_data_bytes=0:truncate_lut=0;",
                        self.collection.namespace, self.collection.set, objects
                    ),
                }
            })
            .collect();
        Ok(nodes)
    }
}
