//! Core trait abstractions (Ports in Hexagonal Architecture)

use std::collections::BTreeMap;

use super::error::{ElasticError, IndexerResult};
use super::types::{EsdtToken, UserAccount};
use crate::client::response::MultiGetResponse;

/// Callback invoked once per scroll page with the raw page body
pub type ScrollHandler<'a> = dyn FnMut(&[u8]) -> Result<(), ElasticError> + 'a;

/// Database client port - everything the orchestrator needs from the search cluster
pub trait DatabaseClient: Send + Sync {
    /// Submit one NDJSON bulk buffer; `index` may be empty when every line names its index
    fn bulk(&self, buffer: &[u8], index: &str) -> Result<(), ElasticError>;

    /// Index a single document under the provided id
    fn index_document(&self, document: &[u8], id: &str, index: &str) -> Result<(), ElasticError>;

    /// Remove the documents with the provided ids
    fn bulk_remove(&self, index: &str, ids: &[String]) -> Result<(), ElasticError>;

    /// Fetch several documents by id
    fn multi_get(
        &self,
        ids: &[String],
        index: &str,
        with_source: bool,
    ) -> Result<MultiGetResponse, ElasticError>;

    /// Walk every page matching `query`
    fn scroll_search(
        &self,
        index: &str,
        query: &[u8],
        handler: &mut ScrollHandler<'_>,
    ) -> Result<(), ElasticError>;

    fn check_and_create_index(&self, index: &str) -> Result<(), ElasticError>;

    fn check_and_create_alias(&self, alias: &str, index: &str) -> Result<(), ElasticError>;

    fn check_and_create_template(&self, name: &str, template: &[u8]) -> Result<(), ElasticError>;

    fn check_and_create_policy(&self, name: &str, policy: &[u8]) -> Result<(), ElasticError>;
}

/// Accounts port - read access to the ledger state after a block
pub trait AccountsAdapter: Send + Sync {
    /// Load the account state of `address`
    fn load_account(&self, address: &str) -> IndexerResult<UserAccount>;

    /// Token balance of `address` for `token`/`nonce`, `None` when the account holds nothing
    fn esdt_token(&self, address: &str, token: &str, nonce: u64) -> IndexerResult<Option<EsdtToken>>;
}

/// Source of index templates and lifecycle policies
pub trait TemplatesAndPoliciesReader: Send + Sync {
    /// Template bodies keyed by index name
    fn templates(&self) -> IndexerResult<BTreeMap<String, Vec<u8>>>;

    /// Policy bodies keyed by policy name
    fn policies(&self) -> IndexerResult<BTreeMap<String, Vec<u8>>>;
}
