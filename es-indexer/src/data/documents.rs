//! Documents written to the search cluster
//!
//! Field names follow the cluster mappings (camelCase). Identity fields that
//! are used only as document ids are skipped during serialization.

use serde::{Deserialize, Serialize};

fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Document of the `blocks` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(skip)]
    pub hash: String,
    pub nonce: u64,
    pub round: u64,
    pub epoch: u32,
    pub mini_blocks_hashes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notarized_blocks_hashes: Vec<String>,
    pub proposer: u64,
    pub validators: Vec<u64>,
    pub pub_key_bitmap: String,
    pub size: u64,
    pub size_txs: u64,
    pub timestamp: u64,
    pub state_root_hash: String,
    pub prev_hash: String,
    pub shard_id: u32,
    pub tx_count: u32,
    pub accumulated_fees: String,
    pub developer_fees: String,
    pub epoch_start_block: bool,
    pub search_order: u64,
}

/// Document of the `epochinfo` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochInfo {
    pub accumulated_fees: String,
    pub developer_fees: String,
}

/// Document of the `miniblocks` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Miniblock {
    #[serde(skip)]
    pub hash: String,
    pub sender_shard: u32,
    pub receiver_shard: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sender_block_hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver_block_hash: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proc_type_s: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proc_type_d: String,
    pub timestamp: u64,
}

/// Document of the `transactions` and `operations` indices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(skip)]
    pub hash: String,
    pub mini_block_hash: String,
    pub nonce: u64,
    pub round: u64,
    pub value: String,
    pub receiver: String,
    pub sender: String,
    pub receiver_shard: u32,
    pub sender_shard: u32,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub fee: String,
    pub initial_paid_fee: String,
    pub data: String,
    pub signature: String,
    pub timestamp: u64,
    pub status: String,
    pub search_order: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sender_user_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver_user_name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_sc_results: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_logs: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub guardian: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operation: String,
    pub epoch: u32,
}

/// Document of the `scresults` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScResult {
    #[serde(skip)]
    pub hash: String,
    pub mini_block_hash: String,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub value: String,
    pub sender: String,
    pub receiver: String,
    pub sender_shard: u32,
    pub receiver_shard: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relayer_addr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relayed_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    pub data: String,
    pub prev_tx_hash: String,
    pub original_tx_hash: String,
    pub call_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_metadata: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub return_message: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_sender: String,
    pub epoch: u32,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub can_be_ignored: bool,
}

/// Document of the `receipts` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(skip)]
    pub hash: String,
    pub value: String,
    pub sender: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    pub tx_hash: String,
    pub timestamp: u64,
}

/// Metadata of a non fungible token, in the format stored by the cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetaData {
    pub name: String,
    pub creator: String,
    pub royalties: u32,
    pub hash: String,
    pub uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub attributes: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metadata: String,
    #[serde(rename = "nonEmptyURIs")]
    pub non_empty_uris: bool,
    pub white_listed_storage: bool,
}

/// Document of the `accounts` and `accountsesdt` indices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub address: String,
    pub nonce: u64,
    pub balance: String,
    pub balance_num: f64,
    #[serde(rename = "token", default, skip_serializing_if = "String::is_empty")]
    pub token_name: String,
    #[serde(rename = "identifier", default, skip_serializing_if = "String::is_empty")]
    pub token_identifier: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub token_nonce: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub properties: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub total_balance_with_stake: String,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub total_balance_with_stake_num: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TokenMetaData>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub developer_rewards: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub timestamp: u64,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_owner: String,
    #[serde(skip)]
    pub is_sender: bool,
    #[serde(skip)]
    pub is_nft_create: bool,
}

/// Document of the `accountshistory` and `accountsesdthistory` indices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalanceHistory {
    pub address: String,
    pub timestamp: u64,
    pub balance: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identifier: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub token_nonce: u64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_sender: bool,
    pub shard_id: u32,
}

/// Document of the `tokens` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ticker: String,
    pub token: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_owner: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub nonce: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TokenMetaData>,
    pub timestamp: u64,
}

/// Event nested inside a `logs` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryEvent {
    pub address: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_data: Vec<String>,
    pub order: usize,
}

/// Document of the `logs` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logs {
    #[serde(skip)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_tx_hash: String,
    pub address: String,
    pub events: Vec<LogEntryEvent>,
    pub timestamp: u64,
}

/// Document of the `events` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(skip)]
    pub id: String,
    pub tx_hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_tx_hash: String,
    pub log_address: String,
    pub address: String,
    pub identifier: String,
    pub shard_id: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_data: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    pub order: usize,
    pub tx_order: u32,
    pub timestamp: u64,
}

/// Document of the `validators` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorsPublicKeys {
    pub public_keys: Vec<String>,
}

/// Document of the `rating` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorRatingInfo {
    #[serde(skip)]
    pub id: String,
    pub rating: f32,
}

/// Document of the `rounds` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundInfo {
    pub round: u64,
    pub signers_indexes: Vec<u64>,
    pub block_was_proposed: bool,
    pub shard_id: u32,
    pub epoch: u32,
    pub timestamp: u64,
}
