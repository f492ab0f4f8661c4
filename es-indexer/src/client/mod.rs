//! Search cluster client
//!
//! A synchronous client for the Elasticsearch / OpenSearch wire protocol:
//! bulk submission, single document writes, removal by ids, multi-get,
//! scrolled search and the template/index/alias/policy lifecycle.

mod lifecycle;
pub mod response;
mod scroll;
pub mod transport;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::config::ElasticConfig;
use crate::core::error::ElasticError;
use crate::core::traits::{DatabaseClient, ScrollHandler};
use crate::metrics::StatusMetrics;
use response::{check_bulk_response, check_response, MultiGetResponse};
use transport::{Method, MetricsTransport, Request, RetryTransport, Transport, UreqTransport};

/// Client of the search cluster
pub struct ElasticClient {
    transport: Box<dyn Transport>,
    count_scroll: AtomicU64,
}

impl ElasticClient {
    /// Build the full transport stack: retries on top of metered `ureq` requests
    pub fn new(config: &ElasticConfig, metrics: Arc<StatusMetrics>) -> Self {
        let metered = MetricsTransport::new(UreqTransport::new(config), metrics);
        let retrying = RetryTransport::new(
            metered,
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
            config.retry_statuses.clone(),
        );

        Self::with_transport(Box::new(retrying))
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            count_scroll: AtomicU64::new(0),
        }
    }

    fn send_checked(&self, request: Request) -> Result<(), ElasticError> {
        let response = self.transport.send(&request)?;
        check_response(&request.path, response.status, &response.body)
    }

    /// Submit an NDJSON buffer to the bulk endpoint
    pub fn bulk(&self, buffer: &[u8], index: &str) -> Result<(), ElasticError> {
        let path = if index.is_empty() {
            "/_bulk".to_string()
        } else {
            format!("/{}/_bulk", index)
        };
        let topic = if index.is_empty() { "_bulk" } else { index };
        let request = Request::ndjson(Method::Post, path, buffer.to_vec()).with_topic(topic);

        let response = self.transport.send(&request)?;
        if !response.is_success() {
            check_response(&request.path, response.status, &response.body)?;
        }

        check_bulk_response(&response.body)
    }

    /// Index a single document
    pub fn index_document(&self, document: &[u8], id: &str, index: &str) -> Result<(), ElasticError> {
        let request = Request::json(Method::Put, format!("/{}/_doc/{}", index, id), document.to_vec())
            .with_topic(index);

        self.send_checked(request)
    }

    /// Delete the documents with the given ids
    pub fn bulk_remove(&self, index: &str, ids: &[String]) -> Result<(), ElasticError> {
        if ids.is_empty() {
            return Ok(());
        }

        let body = json!({ "query": { "ids": { "values": ids } } });
        let request = Request::json(
            Method::Post,
            format!("/{}/_delete_by_query", index),
            serde_json::to_vec(&body)?,
        )
        .with_query("ignore_unavailable", "true")
        .with_query("conflicts", "proceed")
        .with_query("refresh", "true")
        .with_topic(index);

        debug!(target: "es_indexer::client", "removing {} documents from {}", ids.len(), index);
        self.send_checked(request)
    }

    /// Fetch documents by id
    pub fn multi_get(
        &self,
        ids: &[String],
        index: &str,
        with_source: bool,
    ) -> Result<MultiGetResponse, ElasticError> {
        if ids.is_empty() {
            return Ok(MultiGetResponse::default());
        }

        let docs: Vec<_> = ids
            .iter()
            .map(|id| json!({ "_id": id, "_source": with_source }))
            .collect();
        let body = json!({ "docs": docs });
        let request = Request::json(Method::Post, format!("/{}/_mget", index), serde_json::to_vec(&body)?)
            .with_topic(index);

        let response = self.transport.send(&request)?;
        check_response(&request.path, response.status, &response.body)?;

        Ok(serde_json::from_slice(&response.body)?)
    }
}

impl DatabaseClient for ElasticClient {
    fn bulk(&self, buffer: &[u8], index: &str) -> Result<(), ElasticError> {
        ElasticClient::bulk(self, buffer, index)
    }

    fn index_document(&self, document: &[u8], id: &str, index: &str) -> Result<(), ElasticError> {
        ElasticClient::index_document(self, document, id, index)
    }

    fn bulk_remove(&self, index: &str, ids: &[String]) -> Result<(), ElasticError> {
        ElasticClient::bulk_remove(self, index, ids)
    }

    fn multi_get(
        &self,
        ids: &[String],
        index: &str,
        with_source: bool,
    ) -> Result<MultiGetResponse, ElasticError> {
        ElasticClient::multi_get(self, ids, index, with_source)
    }

    fn scroll_search(
        &self,
        index: &str,
        query: &[u8],
        handler: &mut ScrollHandler<'_>,
    ) -> Result<(), ElasticError> {
        ElasticClient::scroll_search(self, index, query, handler)
    }

    fn check_and_create_index(&self, index: &str) -> Result<(), ElasticError> {
        ElasticClient::check_and_create_index(self, index)
    }

    fn check_and_create_alias(&self, alias: &str, index: &str) -> Result<(), ElasticError> {
        ElasticClient::check_and_create_alias(self, alias, index)
    }

    fn check_and_create_template(&self, name: &str, template: &[u8]) -> Result<(), ElasticError> {
        ElasticClient::check_and_create_template(self, name, template)
    }

    fn check_and_create_policy(&self, name: &str, policy: &[u8]) -> Result<(), ElasticError> {
        ElasticClient::check_and_create_policy(self, name, policy)
    }
}
