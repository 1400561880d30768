//! Search store adapter.
//!
//! Conditions, sorting and projection are pushed down to the store. Results
//! larger than one page are read through a scroll cursor.

use std::time::Duration;

use log::{debug, warn};
use serde_json::{json, Value};

use crate::backend::{Capabilities, RecordSource, ScanFlow, ScanVisitor};
use crate::config::{SearchSettings, PRIMARY_KEY_FIELD};
use crate::error_handling::{BackendError, DbqError};
use crate::projection::Record;
use crate::query::{FieldPath, FilterCondition, FilterOp, QuerySpec};
use crate::translate::{sort_clauses, source_fields, translate};

/// One search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Compiled boolean query
    pub query: Value,
    /// `_source` includes; `None` returns whole documents
    pub source: Option<Vec<String>>,
    /// Sort clauses, in priority order
    pub sort: Vec<Value>,
    /// Maximum hits per response
    pub size: usize,
    /// Server-side timeout
    pub timeout: Duration,
}

impl SearchRequest {
    /// Request body as sent to the store.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "query": self.query,
            "size": self.size,
            "timeout": format!("{}ms", self.timeout.as_millis()),
        });
        if let Some(fields) = &self.source {
            body["_source"] = if fields.is_empty() {
                Value::Bool(false)
            } else {
                json!(fields)
            };
        }
        if !self.sort.is_empty() {
            body["sort"] = Value::Array(self.sort.clone());
        }
        body
    }
}

/// One page of hits. Each hit's key is the document id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<Record>,
    /// Cursor for the next page, when the request opened one
    pub scroll_id: Option<String>,
}

/// Client for a search store.
#[allow(async_fn_in_trait)]
pub trait SearchClient {
    /// Single search returning at most `request.size` hits.
    async fn search(&self, index: &str, request: &SearchRequest)
        -> Result<SearchPage, BackendError>;

    /// Search that opens a scroll cursor kept alive for `keep_alive`.
    async fn open_scroll(
        &self,
        index: &str,
        request: &SearchRequest,
        keep_alive: Duration,
    ) -> Result<SearchPage, BackendError>;

    /// Next page of an open cursor.
    async fn scroll(&self, scroll_id: &str, keep_alive: Duration)
        -> Result<SearchPage, BackendError>;

    /// Releases a cursor.
    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), BackendError>;

    /// Number of documents matching `query`.
    async fn count(&self, index: &str, query: &Value) -> Result<u64, BackendError>;
}

/// [`RecordSource`] over a [`SearchClient`].
pub struct SearchSource<C> {
    client: C,
    index: String,
    settings: SearchSettings,
}

impl<C: SearchClient> SearchSource<C> {
    pub fn new(client: C, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            settings: SearchSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    fn request(&self, spec: &QuerySpec, size: usize) -> Result<SearchRequest, DbqError> {
        Ok(SearchRequest {
            query: translate(spec)?.to_json(),
            source: source_fields(spec),
            sort: sort_clauses(spec),
            size,
            timeout: self.settings.request_timeout,
        })
    }

    /// Walks a scroll cursor page by page and returns the requests issued.
    /// The latest cursor id is left in `cursor` for the caller to release.
    async fn drain_scroll(
        &self,
        request: &SearchRequest,
        limit: Option<usize>,
        visitor: &mut dyn ScanVisitor,
        cursor: &mut Option<String>,
    ) -> Result<usize, DbqError> {
        let keep_alive = self.settings.keep_alive;
        visitor.requesting();
        let mut page = self
            .client
            .open_scroll(&self.index, request, keep_alive)
            .await?;
        let mut requests = 1;
        let mut delivered = 0usize;

        loop {
            if page.scroll_id.is_some() {
                *cursor = page.scroll_id.clone();
            }
            if page.hits.is_empty() {
                return Ok(requests);
            }
            for hit in page.hits {
                delivered += 1;
                if visitor.visit(hit)? == ScanFlow::Stop {
                    return Ok(requests);
                }
                if limit.is_some_and(|n| delivered >= n) {
                    return Ok(requests);
                }
            }
            let Some(scroll_id) = cursor.as_deref() else {
                return Ok(requests);
            };
            debug!("Fetching scroll page {} from {}", requests + 1, self.index);
            visitor.requesting();
            page = self.client.scroll(scroll_id, keep_alive).await?;
            requests += 1;
        }
    }
}

impl<C: SearchClient> RecordSource for SearchSource<C> {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: "search",
            native_filtering: true,
            native_sort: true,
            cursoring: true,
            guaranteed_keys: true,
            embeds_key_in_body: true,
            max_chunk_size: Some(self.settings.page_size),
            in_memory_ceiling: self.settings.page_size,
        }
    }

    fn describe(&self) -> String {
        self.index.clone()
    }

    async fn lookup(&self, keys: &[String], spec: &QuerySpec) -> Result<Vec<Record>, DbqError> {
        let ids = Value::Array(keys.iter().cloned().map(Value::String).collect());
        let by_id = FilterCondition::new(FieldPath::parse(PRIMARY_KEY_FIELD), FilterOp::In, ids)?;
        let request = self.request(&spec.with_extra_filter(by_id), keys.len())?;
        let page = self.client.search(&self.index, &request).await?;
        Ok(page.hits)
    }

    async fn prepare_scan(&self, _spec: &QuerySpec) -> Result<Option<u64>, DbqError> {
        Ok(None)
    }

    async fn traverse(
        &self,
        spec: &QuerySpec,
        limit: Option<usize>,
        visitor: &mut dyn ScanVisitor,
    ) -> Result<usize, DbqError> {
        let page_size = self.settings.page_size;

        if let Some(n) = limit.filter(|n| *n <= page_size) {
            let request = self.request(spec, n)?;
            visitor.requesting();
            let page = self.client.search(&self.index, &request).await?;
            for hit in page.hits {
                if visitor.visit(hit)? == ScanFlow::Stop {
                    break;
                }
            }
            return Ok(1);
        }

        let request = self.request(spec, page_size)?;
        let mut cursor: Option<String> = None;
        let outcome = self.drain_scroll(&request, limit, visitor, &mut cursor).await;

        if self.settings.clear_scroll {
            if let Some(scroll_id) = cursor {
                if let Err(e) = self.client.clear_scroll(&scroll_id).await {
                    warn!("Failed to clear scroll cursor on {}: {}", self.index, e);
                }
            }
        }
        outcome
    }

    async fn count(&self, spec: &QuerySpec) -> Result<u64, DbqError> {
        let query = translate(spec)?.to_json();
        Ok(self.client.count(&self.index, &query).await?)
    }
}
