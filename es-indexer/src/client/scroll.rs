//! Scrolled search

use std::sync::atomic::Ordering;

use serde_json::json;
use tracing::{debug, warn};

use super::response::{check_response, hits_count, scroll_id};
use super::transport::{Method, Request};
use super::ElasticClient;
use crate::core::error::ElasticError;
use crate::core::traits::ScrollHandler;

/// Hits per scroll page
pub const SCROLL_PAGE_SIZE: usize = 9000;

const INITIAL_SCROLL_KEEP_ALIVE_MS: u64 = 600_000;
const CONTINUE_SCROLL_KEEP_ALIVE_MS: u64 = 120_000;

impl ElasticClient {
    /// Run `query` against `index` and hand every page to `handler`
    ///
    /// The first page is always handed over, later pages only while they carry
    /// hits. The scroll context is cleared on every exit path once opened.
    pub fn scroll_search(
        &self,
        index: &str,
        query: &[u8],
        handler: &mut ScrollHandler<'_>,
    ) -> Result<(), ElasticError> {
        let counter = self.count_scroll.fetch_add(1, Ordering::SeqCst) + 1;

        let request = Request::json(Method::Post, format!("/{}/_search", index), query.to_vec())
            .with_query("size", SCROLL_PAGE_SIZE.to_string())
            .with_query("scroll", format!("{}ms", INITIAL_SCROLL_KEEP_ALIVE_MS + counter))
            .with_topic(index);
        let response = self.transport.send(&request)?;
        check_response(&request.path, response.status, &response.body)?;

        let id = scroll_id(&response.body)?;
        let result = self.iterate_scroll(&id, &response.body, handler);

        if !id.is_empty() {
            self.clear_scroll(&id);
        }

        result
    }

    fn iterate_scroll(
        &self,
        id: &str,
        first_page: &[u8],
        handler: &mut ScrollHandler<'_>,
    ) -> Result<(), ElasticError> {
        handler(first_page)?;
        if id.is_empty() {
            return Ok(());
        }

        let mut id = id.to_string();
        loop {
            let counter = self.count_scroll.fetch_add(1, Ordering::SeqCst) + 1;
            let body = json!({
                "scroll": format!("{}ms", CONTINUE_SCROLL_KEEP_ALIVE_MS + counter),
                "scroll_id": id,
            });
            let request = Request::json(Method::Post, "/_search/scroll", serde_json::to_vec(&body)?)
                .with_topic("_search_scroll");
            let response = self.transport.send(&request)?;
            check_response(&request.path, response.status, &response.body)?;

            if hits_count(&response.body)? < 1 {
                return Ok(());
            }
            handler(&response.body)?;

            let next = scroll_id(&response.body)?;
            if !next.is_empty() {
                id = next;
            }
        }
    }

    fn clear_scroll(&self, id: &str) {
        let body = json!({ "scroll_id": [id] });
        let payload = match serde_json::to_vec(&body) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "es_indexer::client", "cannot encode clear scroll body: {}", err);
                return;
            }
        };

        let request = Request::json(Method::Delete, "/_search/scroll", payload).with_topic("_search_scroll");
        match self.transport.send(&request) {
            Ok(response) if response.status == 404 => {
                debug!(target: "es_indexer::client", "scroll context already gone");
            }
            Ok(response) => {
                if let Err(err) = check_response(&request.path, response.status, &response.body) {
                    warn!(target: "es_indexer::client", "cannot clear scroll: {}", err);
                }
            }
            Err(err) => warn!(target: "es_indexer::client", "cannot clear scroll: {}", err),
        }
    }
}
