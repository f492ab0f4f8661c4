//! Indexing orchestrator
//!
//! [`ElasticProcessor`] receives the block commit events, runs them through
//! the entity processors and submits the resulting bulk buffers. Every save
//! operation is skipped for indices that are not enabled.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::response::hits_ids;
use crate::converters::BalanceConverter;
use crate::core::error::{ElasticError, IndexerResult, ProcessorError};
use crate::core::traits::{AccountsAdapter, DatabaseClient, TemplatesAndPoliciesReader};
use crate::core::types::{
    Body, Header, MiniBlockType, OutportBlock, RoundInfo, ValidatorsPubKeys, ValidatorsRating,
};
use crate::data::documents::{AccountInfo, TokenInfo};
use crate::data::indices::*;
use crate::data::{AlteredAccounts, BufferSlice};
use crate::processors::accounts::{collections_to_resolve, put_type_and_owner_in_accounts_esdt, EsdtAccount, RegularAccount};
use crate::processors::{
    AccountsProcessor, BlockProcessor, LogsAndEventsProcessor, MiniblocksProcessor, PreparedResults,
    StatisticsProcessor, TagCounter, TokensProcessor, TransactionsProcessor, ValidatorsProcessor,
};

const TARGET: &str = "es_indexer::orchestrator";

/// Collaborators and settings of an [`ElasticProcessor`]
#[derive(Clone)]
pub struct ArgsElasticProcessor {
    pub client: Option<Arc<dyn DatabaseClient>>,
    pub accounts: Option<Arc<dyn AccountsAdapter>>,
    pub templates: Option<Arc<dyn TemplatesAndPoliciesReader>>,
    pub enabled_indices: Vec<String>,
    pub denomination: i32,
    /// Byte threshold of one bulk request, zero for the default
    pub bulk_request_max_size: usize,
    /// Install the lifecycle policies during [`ElasticProcessor::init`]
    pub use_kibana: bool,
    /// Copy the type of newly issued tokens into documents already indexed
    pub with_scroll_on_tokens: bool,
}

impl Default for ArgsElasticProcessor {
    fn default() -> Self {
        Self {
            client: None,
            accounts: None,
            templates: None,
            enabled_indices: Vec::new(),
            denomination: 0,
            bulk_request_max_size: 0,
            use_kibana: false,
            with_scroll_on_tokens: true,
        }
    }
}

/// Routes block data through the processors into the search cluster
pub struct ElasticProcessor {
    client: Arc<dyn DatabaseClient>,
    templates: Arc<dyn TemplatesAndPoliciesReader>,
    enabled_indices: BTreeSet<String>,
    bulk_request_max_size: usize,
    use_kibana: bool,
    with_scroll_on_tokens: bool,

    block: BlockProcessor,
    miniblocks: MiniblocksProcessor,
    transactions: TransactionsProcessor,
    logs_events: LogsAndEventsProcessor,
    accounts: AccountsProcessor,
    tokens: TokensProcessor,
    validators: ValidatorsProcessor,
    statistics: StatisticsProcessor,
}

impl ElasticProcessor {
    pub fn new(args: ArgsElasticProcessor) -> IndexerResult<Self> {
        let client = args.client.ok_or(ProcessorError::MissingComponent("database client"))?;
        let accounts = args.accounts.ok_or(ProcessorError::MissingComponent("accounts adapter"))?;
        let templates = args
            .templates
            .ok_or(ProcessorError::MissingComponent("templates and policies reader"))?;

        if args.enabled_indices.is_empty() {
            return Err(ProcessorError::NoEnabledIndices.into());
        }
        if let Some(unknown) = args.enabled_indices.iter().find(|index| !is_known_index(index)) {
            return Err(ProcessorError::UnknownIndex(unknown.clone()).into());
        }

        let balance_converter = BalanceConverter::new(args.denomination)?;

        Ok(Self {
            client,
            templates,
            enabled_indices: args.enabled_indices.into_iter().collect(),
            bulk_request_max_size: args.bulk_request_max_size,
            use_kibana: args.use_kibana,
            with_scroll_on_tokens: args.with_scroll_on_tokens,
            block: BlockProcessor::new(),
            miniblocks: MiniblocksProcessor::new(),
            transactions: TransactionsProcessor::new(),
            logs_events: LogsAndEventsProcessor::new(),
            accounts: AccountsProcessor::new(balance_converter, accounts),
            tokens: TokensProcessor::new(),
            validators: ValidatorsProcessor::new(),
            statistics: StatisticsProcessor::new(),
        })
    }

    /// Policies, templates, backing indices and aliases, in that order
    pub fn init(&self) -> IndexerResult<()> {
        if self.use_kibana {
            for (name, policy) in self.templates.policies()? {
                self.client.check_and_create_policy(&name, &policy)?;
            }
        }

        let templates = self.templates.templates()?;
        // the lifecycle template applies to the policy indices and goes first
        if let Some(template) = templates.get(OPEN_DISTRO_INDEX) {
            self.client.check_and_create_template(OPEN_DISTRO_INDEX, template)?;
        }
        for (name, template) in templates.iter().filter(|(name, _)| name.as_str() != OPEN_DISTRO_INDEX) {
            self.client.check_and_create_template(name, template)?;
        }

        for index in self.enabled() {
            self.client.check_and_create_index(&backing_index(index))?;
        }
        for index in self.enabled() {
            self.client.check_and_create_alias(index, &backing_index(index))?;
        }

        info!(target: TARGET, "initialized {} indices", self.enabled_indices.len());
        Ok(())
    }

    pub fn is_index_enabled(&self, index: &str) -> bool {
        self.enabled_indices.contains(index)
    }

    /// Block document and, on the metachain, the epoch fees
    pub fn save_header(&self, outport: &OutportBlock) -> IndexerResult<()> {
        let mut buffer = self.new_buffer();

        if self.is_index_enabled(BLOCK_INDEX) {
            let block = self.block.prepare_block_for_db(outport)?;
            self.block.serialize_block(&block, &mut buffer, BLOCK_INDEX)?;
        }
        if outport.header.is_metachain() && self.is_index_enabled(EPOCH_INFO_INDEX) {
            self.block.serialize_epoch_info(&outport.header, &mut buffer, EPOCH_INFO_INDEX)?;
        }

        self.do_bulk_requests(&buffer)
    }

    pub fn remove_header(&self, header_hash: &str) -> IndexerResult<()> {
        if !self.is_index_enabled(BLOCK_INDEX) {
            return Ok(());
        }

        self.client.bulk_remove(BLOCK_INDEX, &[header_hash.to_string()])?;
        Ok(())
    }

    /// Index new miniblocks; complete the ones already written by the other shard
    pub fn save_miniblocks(&self, outport: &OutportBlock) -> IndexerResult<()> {
        if !self.is_index_enabled(MINIBLOCKS_INDEX) {
            return Ok(());
        }

        let miniblocks = self.miniblocks.prepare_db_miniblocks(outport);
        if miniblocks.is_empty() {
            return Ok(());
        }

        let hashes: Vec<String> = miniblocks.iter().map(|miniblock| miniblock.hash.clone()).collect();
        let response = self.client.multi_get(&hashes, MINIBLOCKS_INDEX, false)?;
        let existing: HashSet<String> = response.found_ids().map(str::to_string).collect();

        let mut buffer = self.new_buffer();
        self.miniblocks.serialize_bulk_miniblocks(
            &miniblocks,
            &existing,
            &mut buffer,
            MINIBLOCKS_INDEX,
            outport.header.shard_id,
        )?;
        self.do_bulk_requests(&buffer)
    }

    pub fn remove_miniblocks(&self, header: &Header, body: &Body) -> IndexerResult<()> {
        if !self.is_index_enabled(MINIBLOCKS_INDEX) {
            return Ok(());
        }

        let hashes = self.miniblocks.get_miniblocks_hashes_hex_encoded(header, body);
        if hashes.is_empty() {
            return Ok(());
        }

        self.client.bulk_remove(MINIBLOCKS_INDEX, &hashes)?;
        Ok(())
    }

    /// Everything derived from the transaction pool and the altered accounts
    pub fn save_transactions(&self, outport: &OutportBlock) -> IndexerResult<()> {
        let header = &outport.header;
        let mut results = self.transactions.prepare_transactions_for_database(outport);
        let logs_data = self.logs_events.extract_data_from_logs(outport, &mut results);

        let mut buffer = self.new_buffer();
        self.prepare_transactions(&results, header.shard_id, &mut buffer)?;

        if self.is_index_enabled(TOKENS_INDEX) {
            let mut nft_created = logs_data.nft_created;
            self.accounts.put_token_metadata_in_tokens(&mut nft_created, &outport.accounts);
            self.tokens.serialize_nft_create_info(&nft_created, &mut buffer, TOKENS_INDEX)?;
        }
        if self.is_index_enabled(LOGS_INDEX) {
            self.logs_events.serialize_logs(&logs_data.logs, &mut buffer, LOGS_INDEX)?;
        }
        if self.is_index_enabled(EVENTS_INDEX) {
            self.logs_events.serialize_events(&logs_data.events, &mut buffer, EVENTS_INDEX)?;
        }
        if self.is_index_enabled(SC_RESULTS_INDEX) {
            self.transactions
                .serialize_sc_results(&results.sc_results, &mut buffer, SC_RESULTS_INDEX)?;
        }
        if self.is_index_enabled(RECEIPTS_INDEX) {
            self.transactions
                .serialize_receipts(&results.receipts, &mut buffer, RECEIPTS_INDEX)?;
        }

        let mut tags = TagCounter::new();
        self.prepare_altered_accounts(outport, &mut tags, &mut buffer)?;

        if self.is_index_enabled(TAGS_INDEX) {
            tags.serialize(&mut buffer, TAGS_INDEX)?;
        }
        if self.is_index_enabled(TOKENS_INDEX) {
            self.tokens.serialize_tokens(&logs_data.tokens, &mut buffer, TOKENS_INDEX)?;
        }

        self.do_bulk_requests(&buffer)?;

        if self.with_scroll_on_tokens {
            self.index_token_types(&logs_data.tokens)?;
        }

        debug!(
            target: TARGET,
            "saved {} transactions, {} smart contract results and {} receipts of block {}",
            results.transactions.len(),
            results.sc_results.len(),
            results.receipts.len(),
            outport.header_hash
        );
        Ok(())
    }

    /// Remove what this shard wrote for a reverted block
    pub fn remove_transactions(&self, header: &Header, body: &Body) -> IndexerResult<()> {
        let (txs, scrs) = self.transactions.get_hex_encoded_hashes_for_remove(header, body);

        if self.is_index_enabled(TRANSACTIONS_INDEX) && !txs.is_empty() {
            self.client.bulk_remove(TRANSACTIONS_INDEX, &txs)?;
        }
        if self.is_index_enabled(OPERATIONS_INDEX) && !(txs.is_empty() && scrs.is_empty()) {
            let operations: Vec<String> = txs.iter().chain(scrs.iter()).cloned().collect();
            self.client.bulk_remove(OPERATIONS_INDEX, &operations)?;
        }
        if self.is_index_enabled(SC_RESULTS_INDEX) && !scrs.is_empty() {
            self.client.bulk_remove(SC_RESULTS_INDEX, &scrs)?;
        }

        let receipts: Vec<String> = body
            .miniblocks
            .iter()
            .filter(|miniblock| miniblock.kind == MiniBlockType::ReceiptBlock)
            .flat_map(|miniblock| miniblock.tx_hashes.iter().cloned())
            .collect();
        if self.is_index_enabled(RECEIPTS_INDEX) && !receipts.is_empty() {
            self.client.bulk_remove(RECEIPTS_INDEX, &receipts)?;
        }

        Ok(())
    }

    pub fn save_validators_pub_keys(&self, validators: &ValidatorsPubKeys) -> IndexerResult<()> {
        if !self.is_index_enabled(VALIDATORS_INDEX) {
            return Ok(());
        }

        let mut buffer = self.new_buffer();
        self.validators
            .serialize_validators_pub_keys(validators, &mut buffer, VALIDATORS_INDEX)?;
        self.do_bulk_requests(&buffer)
    }

    pub fn save_validators_rating(&self, rating: &ValidatorsRating) -> IndexerResult<()> {
        if !self.is_index_enabled(RATING_INDEX) {
            return Ok(());
        }

        let ratings = self.validators.prepare_validators_rating(rating);
        let mut buffer = self.new_buffer();
        self.validators
            .serialize_validators_rating(&ratings, &mut buffer, RATING_INDEX)?;
        self.do_bulk_requests(&buffer)
    }

    pub fn save_rounds_info(&self, rounds: &[RoundInfo]) -> IndexerResult<()> {
        if !self.is_index_enabled(ROUNDS_INDEX) {
            return Ok(());
        }

        let mut buffer = self.new_buffer();
        self.statistics.serialize_rounds_info(rounds, &mut buffer, ROUNDS_INDEX)?;
        self.do_bulk_requests(&buffer)
    }

    /// Submit the buffers one after the other; the first failure stops the submission
    pub fn do_bulk_requests(&self, buffer: &BufferSlice) -> IndexerResult<()> {
        for (position, data) in buffer.buffers().iter().enumerate() {
            if data.is_empty() {
                continue;
            }

            debug!(target: TARGET, "bulk request {} of {} bytes", position, data.len());
            self.client.bulk(data, "")?;
        }
        Ok(())
    }

    fn enabled(&self) -> impl Iterator<Item = &'static str> + '_ {
        ALL_INDICES
            .iter()
            .copied()
            .filter(|index| self.is_index_enabled(index))
    }

    fn new_buffer(&self) -> BufferSlice {
        BufferSlice::new(self.bulk_request_max_size)
    }

    fn prepare_transactions(&self, results: &PreparedResults, shard_id: u32, buffer: &mut BufferSlice) -> IndexerResult<()> {
        if self.is_index_enabled(TRANSACTIONS_INDEX) {
            self.transactions
                .serialize_transactions(&results.transactions, shard_id, buffer, TRANSACTIONS_INDEX)?;
        }
        if self.is_index_enabled(OPERATIONS_INDEX) {
            self.transactions
                .serialize_operations(results, shard_id, buffer, OPERATIONS_INDEX)?;
        }
        Ok(())
    }

    fn prepare_altered_accounts(
        &self,
        outport: &OutportBlock,
        tags: &mut TagCounter,
        buffer: &mut BufferSlice,
    ) -> IndexerResult<()> {
        let wants_regular = self.is_index_enabled(ACCOUNTS_INDEX) || self.is_index_enabled(ACCOUNTS_HISTORY_INDEX);
        let wants_esdt =
            self.is_index_enabled(ACCOUNTS_ESDT_INDEX) || self.is_index_enabled(ACCOUNTS_ESDT_HISTORY_INDEX);
        if !wants_regular && !wants_esdt {
            return Ok(());
        }

        let mut altered = AlteredAccounts::new();
        for account in &outport.altered_accounts {
            altered.add(&account.address, account.clone());
        }
        if altered.is_empty() {
            return Ok(());
        }

        let (regular, esdt) = self.accounts.get_accounts(&altered);
        if wants_regular {
            self.prepare_regular_accounts(&outport.header, &regular, buffer)?;
        }
        if wants_esdt {
            self.prepare_esdt_accounts(&outport.header, &esdt, tags, buffer)?;
        }
        Ok(())
    }

    fn prepare_regular_accounts(&self, header: &Header, accounts: &[RegularAccount], buffer: &mut BufferSlice) -> IndexerResult<()> {
        let accounts_map = self.accounts.prepare_regular_accounts_map(header.timestamp, accounts);
        if self.is_index_enabled(ACCOUNTS_INDEX) {
            self.accounts.serialize_accounts(&accounts_map, buffer, ACCOUNTS_INDEX)?;
        }
        if self.is_index_enabled(ACCOUNTS_HISTORY_INDEX) {
            let history = self
                .accounts
                .prepare_accounts_history(header.timestamp, &accounts_map, header.shard_id);
            self.accounts
                .serialize_accounts_history(&history, buffer, ACCOUNTS_HISTORY_INDEX)?;
        }
        Ok(())
    }

    fn prepare_esdt_accounts(
        &self,
        header: &Header,
        accounts: &[EsdtAccount],
        tags: &mut TagCounter,
        buffer: &mut BufferSlice,
    ) -> IndexerResult<()> {
        let (mut accounts_map, tokens) = self
            .accounts
            .prepare_accounts_map_esdt(header.timestamp, accounts, tags);
        self.add_type_and_owner(&tokens, &mut accounts_map)?;

        if self.is_index_enabled(ACCOUNTS_ESDT_INDEX) {
            self.accounts
                .serialize_accounts_esdt(&accounts_map, buffer, ACCOUNTS_ESDT_INDEX)?;
        }
        if self.is_index_enabled(ACCOUNTS_ESDT_HISTORY_INDEX) {
            let history = self
                .accounts
                .prepare_accounts_history(header.timestamp, &accounts_map, header.shard_id);
            self.accounts
                .serialize_accounts_history(&history, buffer, ACCOUNTS_ESDT_HISTORY_INDEX)?;
        }
        Ok(())
    }

    /// Type and current owner of the collections, as stored in the `tokens` index
    fn add_type_and_owner(&self, tokens: &[TokenInfo], accounts: &mut BTreeMap<String, AccountInfo>) -> IndexerResult<()> {
        if !self.is_index_enabled(TOKENS_INDEX) {
            return Ok(());
        }

        let collections = collections_to_resolve(tokens);
        if collections.is_empty() {
            return Ok(());
        }

        let response = self.client.multi_get(&collections, TOKENS_INDEX, true)?;
        put_type_and_owner_in_accounts_esdt(&response, accounts);
        Ok(())
    }

    /// Copy the type of newly issued tokens into the documents indexed before the issue event
    fn index_token_types(&self, tokens: &[TokenInfo]) -> IndexerResult<()> {
        for token in self.tokens.tokens_needing_type_backfill(tokens) {
            let query = self.tokens.type_backfill_query(&token.token);

            for index in [ACCOUNTS_ESDT_INDEX, TOKENS_INDEX] {
                if !self.is_index_enabled(index) {
                    continue;
                }

                let mut handler = |page: &[u8]| -> Result<(), ElasticError> {
                    let ids = hits_ids(page)?;
                    if ids.is_empty() {
                        return Ok(());
                    }

                    let mut buffer = self.new_buffer();
                    self.tokens
                        .serialize_type_for_provided_ids(&ids, &token.kind, &mut buffer, index);
                    for data in buffer.buffers().iter().filter(|data| !data.is_empty()) {
                        self.client.bulk(data, "")?;
                    }
                    Ok(())
                };
                self.client.scroll_search(index, &query, &mut handler)?;
            }
            debug!(target: TARGET, "backfilled type {} of token {}", token.kind, token.token);
        }
        Ok(())
    }
}
