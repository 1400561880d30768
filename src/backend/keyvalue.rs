//! Key/value store adapter.
//!
//! The store addresses records by `(namespace, set, key)`, returns named bins
//! and has no server-side filtering, so every condition is evaluated
//! client-side by the engine.

use std::fmt;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::{Capabilities, RecordSource, ScanFlow, ScanVisitor};
use crate::config::{ReadPolicy, ScanPolicy, KEY_VALUE_IN_MEMORY_CEILING};
use crate::error_handling::{BackendError, ConfigurationError, DbqError};
use crate::projection::Record;
use crate::query::QuerySpec;

/// Info command that lists per-set statistics on every node.
pub const SETS_INFO_COMMAND: &str = "sets";

static OBJECTS_FIELD: Lazy<Regex> = Lazy::new(|| {
    // Matches the `objects=` counter inside one `ns=..:set=..:` entry.
    Regex::new(r"ns=([^:;]+):set=([^:;]+):objects=(\d+)").expect("static regex is valid")
});

/// Namespace and set a query runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub namespace: String,
    pub set: String,
}

impl Collection {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.set)
    }
}

/// Raw info response from one cluster node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub node: String,
    pub response: String,
}

/// Client for a key/value store. Connection handling, retries and timeouts
/// belong to the implementation and the policies passed in.
#[allow(async_fn_in_trait)]
pub trait KeyValueClient {
    /// Reads many keys in one request. The result has one entry per key, in
    /// key order, with no body for keys that do not exist. `bins` limits the
    /// returned fields; `None` returns all of them.
    async fn get_many(
        &self,
        collection: &Collection,
        keys: &[String],
        bins: Option<&[String]>,
        policy: &ReadPolicy,
    ) -> Result<Vec<Record>, BackendError>;

    /// Scans the whole set, calling `visitor` once per record until it
    /// returns [`ScanFlow::Stop`].
    async fn scan(
        &self,
        collection: &Collection,
        bins: Option<&[String]>,
        policy: &ScanPolicy,
        visitor: &mut dyn FnMut(Record) -> ScanFlow,
    ) -> Result<(), BackendError>;

    /// Runs an info command on every node.
    async fn info(&self, command: &str) -> Result<Vec<NodeInfo>, BackendError>;
}

/// [`RecordSource`] over a [`KeyValueClient`].
pub struct KeyValueSource<C> {
    client: C,
    collection: Collection,
    read_policy: ReadPolicy,
    scan_policy: ScanPolicy,
}

impl<C: KeyValueClient> KeyValueSource<C> {
    pub fn new(client: C, collection: Collection) -> Self {
        Self {
            client,
            collection,
            read_policy: ReadPolicy::default(),
            scan_policy: ScanPolicy::default(),
        }
    }

    pub fn with_read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn with_scan_policy(mut self, policy: ScanPolicy) -> Self {
        self.scan_policy = policy;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Sums the `objects` counter for this collection across all nodes.
    ///
    /// # Errors
    ///
    /// `EmptyCollection` when no node reports any record for the set.
    pub async fn total_objects(&self) -> Result<u64, DbqError> {
        let nodes = self.client.info(SETS_INFO_COMMAND).await?;
        let total = sum_objects(&nodes, &self.collection);
        if total == 0 {
            return Err(ConfigurationError::EmptyCollection(self.collection.to_string()).into());
        }
        Ok(total)
    }
}

/// Adds up the objects counter of `collection` in every node response.
/// Unparseable responses count as zero.
pub fn sum_objects(nodes: &[NodeInfo], collection: &Collection) -> u64 {
    let mut total = 0u64;
    for info in nodes {
        let mut found = false;
        for caps in OBJECTS_FIELD.captures_iter(&info.response) {
            if caps[1] == collection.namespace && caps[2] == collection.set {
                if let Ok(count) = caps[3].parse::<u64>() {
                    total += count;
                    found = true;
                }
            }
        }
        if !found {
            debug!("Node {} reports no objects for {}", info.node, collection);
        }
    }
    total
}

impl<C: KeyValueClient> RecordSource for KeyValueSource<C> {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: "key/value",
            native_filtering: false,
            native_sort: false,
            cursoring: false,
            guaranteed_keys: false,
            embeds_key_in_body: false,
            max_chunk_size: None,
            in_memory_ceiling: KEY_VALUE_IN_MEMORY_CEILING,
        }
    }

    fn describe(&self) -> String {
        self.collection.to_string()
    }

    async fn lookup(&self, keys: &[String], spec: &QuerySpec) -> Result<Vec<Record>, DbqError> {
        let bins = spec.fetched_fields();
        let records = self
            .client
            .get_many(&self.collection, keys, bins.as_deref(), &self.read_policy)
            .await?;
        Ok(records)
    }

    async fn prepare_scan(&self, _spec: &QuerySpec) -> Result<Option<u64>, DbqError> {
        self.total_objects().await.map(Some)
    }

    async fn traverse(
        &self,
        spec: &QuerySpec,
        _limit: Option<usize>,
        visitor: &mut dyn ScanVisitor,
    ) -> Result<usize, DbqError> {
        let bins = spec.fetched_fields();
        let mut failure: Option<DbqError> = None;
        visitor.requesting();
        let mut forward = |record: Record| match visitor.visit(record) {
            Ok(flow) => flow,
            Err(e) => {
                failure = Some(e);
                ScanFlow::Stop
            }
        };
        let scanned = self
            .client
            .scan(
                &self.collection,
                bins.as_deref(),
                &self.scan_policy,
                &mut forward,
            )
            .await;

        // A visitor failure takes precedence over whatever the client reports
        // after being told to stop.
        if let Some(e) = failure {
            if let Err(client_err) = scanned {
                warn!("Scan of {} also failed while stopping: {}", self.collection, client_err);
            }
            return Err(e);
        }
        scanned?;
        Ok(1)
    }

    async fn count(&self, spec: &QuerySpec) -> Result<u64, DbqError> {
        if spec.has_conditions() {
            return Err(ConfigurationError::MissingCapability {
                backend: "key/value",
                feature: "filtered count",
            }
            .into());
        }
        self.total_objects().await
    }
}
