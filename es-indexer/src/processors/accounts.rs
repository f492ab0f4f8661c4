//! Account documents
//!
//! Altered accounts are split into native balance updates (`accounts`) and
//! token balance updates (`accountsesdt`). Token balances are written with a
//! timestamp gated upsert so that a replayed or late block never overwrites a
//! newer balance; a zero balance removes the document under the same rule.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{index_meta, update_meta, TagCounter};
use crate::client::response::MultiGetResponse;
use crate::converters::fields::extract_collection;
use crate::converters::{compute_token_identifier, encode_nonce_to_hex, format_painless_source, prepare_token_metadata};
use crate::converters::BalanceConverter;
use crate::core::error::IndexerResult;
use crate::core::traits::AccountsAdapter;
use crate::core::types::{EsdtToken, UserAccount};
use crate::data::documents::{AccountBalanceHistory, AccountInfo, TokenInfo};
use crate::data::{AlteredAccounts, BufferSlice};

pub const FUNGIBLE_ESDT: &str = "FungibleESDT";

const UPSERT_ACCOUNT_SCRIPT: &str = "
    if ( ctx.op == 'create' )  {
        ctx._source = params.account
    } else {
        if (ctx._source.containsKey('timestamp')) {
            if (ctx._source.timestamp <= params.account.timestamp ) {
                ctx._source = params.account
            }
        } else {
            ctx._source = params.account
        }
    }
";

const DELETE_ACCOUNT_SCRIPT: &str = "
    if ( ctx.op == 'create' )  {
        ctx.op = 'noop'
    } else {
        if (ctx._source.containsKey('timestamp')) {
            if (ctx._source.timestamp <= params.timestamp ) {
                ctx.op = 'delete'
            }
        } else {
            ctx.op = 'delete'
        }
    }
";

/// Native balance change of one address
#[derive(Debug, Clone)]
pub struct RegularAccount {
    pub account: UserAccount,
    pub is_sender: bool,
}

/// Token balance change of one address
#[derive(Debug, Clone)]
pub struct EsdtAccount {
    pub address: String,
    pub token_identifier: String,
    pub nonce: u64,
    pub is_sender: bool,
    pub is_nft_operation: bool,
    pub is_nft_create: bool,
}

pub struct AccountsProcessor {
    balance_converter: BalanceConverter,
    accounts: Arc<dyn AccountsAdapter>,
}

impl AccountsProcessor {
    pub fn new(balance_converter: BalanceConverter, accounts: Arc<dyn AccountsAdapter>) -> Self {
        Self {
            balance_converter,
            accounts,
        }
    }

    /// Split the aggregated deltas of a block into native and token updates
    ///
    /// A token delta also touches the native balance when its account paid
    /// for the operation. Accounts that cannot be loaded are skipped.
    pub fn get_accounts(&self, altered: &AlteredAccounts) -> (Vec<RegularAccount>, Vec<EsdtAccount>) {
        let mut regular = Vec::new();
        let mut esdt = Vec::new();

        let addresses: BTreeSet<&String> = altered.get_all().keys().collect();
        for address in addresses {
            let account = match self.accounts.load_account(address) {
                Ok(account) => account,
                Err(err) => {
                    warn!(
                        target: "es_indexer::processors::accounts",
                        "cannot load account {}: {}", address, err
                    );
                    continue;
                }
            };

            for info in altered.get(address).unwrap_or_default() {
                if info.is_token_operation() {
                    esdt.push(EsdtAccount {
                        address: address.clone(),
                        token_identifier: info.token_identifier.clone(),
                        nonce: parse_nonce(&info.nonce),
                        is_sender: info.is_sender,
                        is_nft_operation: info.is_nft_operation,
                        is_nft_create: info.is_nft_create,
                    });

                    if !info.is_sender {
                        continue;
                    }
                }

                regular.push(RegularAccount {
                    account: account.clone(),
                    is_sender: info.is_sender,
                });
            }
        }

        (regular, esdt)
    }

    pub fn prepare_regular_accounts_map(&self, timestamp: u64, accounts: &[RegularAccount]) -> BTreeMap<String, AccountInfo> {
        let mut accounts_map = BTreeMap::new();
        for regular in accounts {
            let account = &regular.account;
            let balance_num = self.balance_as_float(&account.address, &account.balance);

            accounts_map.insert(
                account.address.clone(),
                AccountInfo {
                    address: account.address.clone(),
                    nonce: account.nonce,
                    balance: account.balance.clone(),
                    balance_num,
                    total_balance_with_stake: account.balance.clone(),
                    total_balance_with_stake_num: balance_num,
                    developer_rewards: account.developer_reward.clone(),
                    owner_address: account.owner_address.clone(),
                    user_name: account.user_name.clone(),
                    timestamp,
                    is_sender: regular.is_sender,
                    ..Default::default()
                },
            );
        }

        accounts_map
    }

    /// Token account documents plus the tokens whose type must be looked up
    ///
    /// Tags of newly created NFTs are counted into `tags`. Zero balances are
    /// kept in the map so that they are serialized as deletes.
    pub fn prepare_accounts_map_esdt(
        &self,
        timestamp: u64,
        accounts: &[EsdtAccount],
        tags: &mut TagCounter,
    ) -> (BTreeMap<String, AccountInfo>, Vec<TokenInfo>) {
        let mut accounts_map = BTreeMap::new();
        let mut tokens = Vec::new();

        for esdt_account in accounts {
            let token = match self.esdt_info(esdt_account) {
                Ok(token) => token.unwrap_or_default(),
                Err(err) => {
                    warn!(
                        target: "es_indexer::processors::accounts",
                        "cannot get token data of {} for {}: {}",
                        esdt_account.address, esdt_account.token_identifier, err
                    );
                    continue;
                }
            };

            let metadata = prepare_token_metadata(token.metadata.as_ref());
            if esdt_account.is_nft_create {
                if let Some(metadata) = &metadata {
                    tags.parse_tags(&metadata.tags);
                }
            }

            let identifier = compute_token_identifier(&esdt_account.token_identifier, esdt_account.nonce);
            let balance = if token.value.is_empty() { "0".to_string() } else { token.value };
            let balance_num = match self.balance_converter.convert_big_value_to_float(&balance) {
                Ok(value) => value,
                Err(err) => {
                    warn!(
                        target: "es_indexer::processors::accounts",
                        "cannot compute balance of {} for {}: {}", esdt_account.address, identifier, err
                    );
                    0.0
                }
            };

            let account = AccountInfo {
                address: esdt_account.address.clone(),
                token_name: esdt_account.token_identifier.clone(),
                token_identifier: identifier.clone(),
                token_nonce: esdt_account.nonce,
                balance: balance.clone(),
                balance_num,
                properties: token.properties,
                data: metadata,
                timestamp,
                kind: if esdt_account.nonce == 0 { FUNGIBLE_ESDT.to_string() } else { String::new() },
                is_sender: esdt_account.is_sender,
                is_nft_create: esdt_account.is_nft_create,
                ..Default::default()
            };

            let key = format!("{}-{}-{}", account.address, account.token_name, esdt_account.nonce);
            accounts_map.insert(key, account);

            if is_zero_balance(&balance) {
                continue;
            }
            tokens.push(TokenInfo {
                token: esdt_account.token_identifier.clone(),
                identifier,
                ..Default::default()
            });
        }

        (accounts_map, tokens)
    }

    pub fn prepare_accounts_history(
        &self,
        timestamp: u64,
        accounts: &BTreeMap<String, AccountInfo>,
        shard_id: u32,
    ) -> BTreeMap<String, AccountBalanceHistory> {
        accounts
            .values()
            .map(|account| {
                let history = AccountBalanceHistory {
                    address: account.address.clone(),
                    timestamp,
                    balance: account.balance.clone(),
                    token: account.token_name.clone(),
                    identifier: if account.token_name.is_empty() {
                        String::new()
                    } else {
                        compute_token_identifier(&account.token_name, account.token_nonce)
                    },
                    token_nonce: account.token_nonce,
                    is_sender: account.is_sender,
                    shard_id,
                };
                let key = format!("{}-{}-{}", history.address, history.token, history.token_nonce);
                (key, history)
            })
            .collect()
    }

    /// Fill in metadata of created NFTs from the account state after the block
    pub fn put_token_metadata_in_tokens(&self, tokens: &mut [TokenInfo], accounts: &[UserAccount]) {
        for token in tokens.iter_mut().filter(|token| token.data.is_none() && token.nonce != 0) {
            let metadata = accounts
                .iter()
                .flat_map(|account| account.esdt.iter())
                .find(|esdt| esdt.token == token.token && esdt.nonce == token.nonce)
                .and_then(|esdt| prepare_token_metadata(esdt.metadata.as_ref()));

            match metadata {
                Some(metadata) => token.data = Some(metadata),
                None => debug!(
                    target: "es_indexer::processors::accounts",
                    "no metadata found for token {}", token.identifier
                ),
            }
        }
    }

    pub fn serialize_accounts(
        &self,
        accounts: &BTreeMap<String, AccountInfo>,
        buffer: &mut BufferSlice,
        index: &str,
    ) -> IndexerResult<()> {
        for account in accounts.values() {
            let doc = serde_json::to_vec(account)?;
            buffer.put_data(&index_meta(index, &account.address), &doc);
        }
        Ok(())
    }

    pub fn serialize_accounts_esdt(
        &self,
        accounts: &BTreeMap<String, AccountInfo>,
        buffer: &mut BufferSlice,
        index: &str,
    ) -> IndexerResult<()> {
        for account in accounts.values() {
            let id = format!(
                "{}-{}-{}",
                account.address,
                account.token_name,
                encode_nonce_to_hex(account.token_nonce)
            );

            let body = if is_zero_balance(&account.balance) {
                format!(
                    "{{\"scripted_upsert\": true, \"script\": {{\"source\": \"{}\",\"lang\": \"painless\",\"params\": {{\"timestamp\": {}}}}},\"upsert\": {{}}}}",
                    format_painless_source(DELETE_ACCOUNT_SCRIPT),
                    account.timestamp
                )
            } else {
                let doc = serde_json::to_string(account)?;
                format!(
                    "{{\"scripted_upsert\": true, \"script\": {{\"source\": \"{}\",\"lang\": \"painless\",\"params\": {{ \"account\": {} }}}},\"upsert\": {{}}}}",
                    format_painless_source(UPSERT_ACCOUNT_SCRIPT),
                    doc
                )
            };
            buffer.put_data(&update_meta(index, &id), body.as_bytes());
        }
        Ok(())
    }

    pub fn serialize_accounts_history(
        &self,
        accounts: &BTreeMap<String, AccountBalanceHistory>,
        buffer: &mut BufferSlice,
        index: &str,
    ) -> IndexerResult<()> {
        for account in accounts.values() {
            let mut id = account.address.clone();
            if !account.token.is_empty() {
                id.push_str(&format!("-{}-{}", account.token, encode_nonce_to_hex(account.token_nonce)));
            }
            id.push_str(&format!("-{}", account.timestamp));

            let doc = serde_json::to_vec(account)?;
            buffer.put_data(&index_meta(index, &id), &doc);
        }
        Ok(())
    }

    fn esdt_info(&self, esdt_account: &EsdtAccount) -> IndexerResult<Option<EsdtToken>> {
        if esdt_account.token_identifier.is_empty() {
            return Ok(None);
        }
        if esdt_account.is_nft_operation && esdt_account.nonce == 0 {
            return Ok(None);
        }

        self.accounts
            .esdt_token(&esdt_account.address, &esdt_account.token_identifier, esdt_account.nonce)
    }

    fn balance_as_float(&self, address: &str, balance: &str) -> f64 {
        match self.balance_converter.compute_balance_as_float(balance) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    target: "es_indexer::processors::accounts",
                    "cannot compute balance of {}: {}", address, err
                );
                0.0
            }
        }
    }
}

/// Collections to look up in the `tokens` index
pub fn collections_to_resolve(tokens: &[TokenInfo]) -> Vec<String> {
    tokens
        .iter()
        .map(|token| extract_collection(&token.identifier).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Copy type and current owner from the stored tokens into the token accounts
pub fn put_type_and_owner_in_accounts_esdt(
    response: &MultiGetResponse,
    accounts: &mut BTreeMap<String, AccountInfo>,
) {
    let mut resolved: BTreeMap<&str, (String, String)> = BTreeMap::new();
    for doc in response.docs.iter().filter(|doc| doc.found) {
        let Some(source) = &doc.source else {
            continue;
        };
        let kind = source.get("type").and_then(|value| value.as_str()).unwrap_or_default();
        if kind.is_empty() {
            continue;
        }
        let owner = source
            .get("currentOwner")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        resolved.insert(doc.id.as_str(), (kind.to_string(), owner.to_string()));
    }

    for account in accounts.values_mut() {
        if let Some((kind, owner)) = resolved.get(account.token_name.as_str()) {
            account.kind = kind.clone();
            account.current_owner = owner.clone();
        }
    }
}

fn is_zero_balance(balance: &str) -> bool {
    balance.is_empty() || balance == "0"
}

fn parse_nonce(nonce: &str) -> u64 {
    if nonce.is_empty() {
        return 0;
    }
    match nonce.parse() {
        Ok(nonce) => nonce,
        Err(err) => {
            warn!(
                target: "es_indexer::processors::accounts",
                "cannot parse token nonce {}: {}", nonce, err
            );
            0
        }
    }
}
