//! Upstream domain types consumed by the indexer
//!
//! These mirror the block-commit events produced by the node's outport driver.
//! Hashes travel hex encoded; addresses are already human readable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Shard identifier of the metachain
pub const METACHAIN_SHARD_ID: u32 = u32::MAX;

/// Receiver shard of miniblocks addressed to every shard
pub const ALL_SHARD_ID: u32 = 0xFFFF_FFF0;

/// Kind of a miniblock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MiniBlockType {
    #[default]
    TxBlock,
    StateBlock,
    PeerBlock,
    SmartContractResultBlock,
    InvalidBlock,
    ReceiptBlock,
    RewardsBlock,
}

impl fmt::Display for MiniBlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MiniBlockType::TxBlock => "TxBlock",
            MiniBlockType::StateBlock => "StateBlock",
            MiniBlockType::PeerBlock => "PeerBlock",
            MiniBlockType::SmartContractResultBlock => "SmartContractResultBlock",
            MiniBlockType::InvalidBlock => "InvalidBlock",
            MiniBlockType::ReceiptBlock => "ReceiptBlock",
            MiniBlockType::RewardsBlock => "RewardsBlock",
        };
        write!(f, "{}", name)
    }
}

/// Processing type of a miniblock inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProcessingType {
    #[default]
    Normal,
    Scheduled,
    Processed,
}

impl fmt::Display for ProcessingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingType::Normal => "Normal",
            ProcessingType::Scheduled => "Scheduled",
            ProcessingType::Processed => "Processed",
        };
        write!(f, "{}", name)
    }
}

/// Reference to a miniblock carried by a header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MiniBlockHeader {
    pub hash: String,
    pub sender_shard_id: u32,
    pub receiver_shard_id: u32,
    pub tx_count: u32,
    #[serde(rename = "type")]
    pub kind: MiniBlockType,
    pub processing_type: ProcessingType,
}

/// Block header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Header {
    pub nonce: u64,
    pub round: u64,
    pub epoch: u32,
    pub shard_id: u32,
    pub timestamp: u64,
    pub prev_hash: String,
    pub state_root_hash: String,
    pub proposer: u64,
    pub validators: Vec<u64>,
    pub pub_key_bitmap: String,
    pub size: u64,
    pub size_txs: u64,
    pub tx_count: u32,
    pub accumulated_fees: String,
    pub developer_fees: String,
    pub accumulated_fees_in_epoch: String,
    pub dev_fees_in_epoch: String,
    pub is_start_of_epoch: bool,
    pub miniblock_headers: Vec<MiniBlockHeader>,
    pub notarized_blocks_hashes: Vec<String>,
}

impl Header {
    pub fn is_metachain(&self) -> bool {
        self.shard_id == METACHAIN_SHARD_ID
    }
}

/// Miniblock with its transaction hashes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MiniBlock {
    pub hash: String,
    pub sender_shard_id: u32,
    pub receiver_shard_id: u32,
    #[serde(rename = "type")]
    pub kind: MiniBlockType,
    pub tx_hashes: Vec<String>,
}

/// Block body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Body {
    pub miniblocks: Vec<MiniBlock>,
}

/// Fee information computed by the node for a transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeeInfo {
    pub gas_used: u64,
    pub fee: String,
    pub initial_paid_fee: String,
}

/// Plain transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Transaction {
    pub nonce: u64,
    pub value: String,
    pub receiver: String,
    pub sender: String,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub data: String,
    pub signature: String,
    pub receiver_user_name: String,
    pub sender_user_name: String,
    pub guardian: String,
    pub version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TxInfo {
    pub transaction: Transaction,
    pub fee_info: FeeInfo,
    pub execution_order: u32,
}

/// Smart contract result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmartContractResult {
    pub nonce: u64,
    pub value: String,
    pub receiver: String,
    pub sender: String,
    pub relayer: String,
    pub relayed_value: String,
    pub code: String,
    pub data: String,
    pub prev_tx_hash: String,
    pub original_tx_hash: String,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub call_type: u32,
    pub code_metadata: String,
    pub return_message: String,
    pub original_sender: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrInfo {
    pub smart_contract_result: SmartContractResult,
    pub fee_info: FeeInfo,
    pub execution_order: u32,
}

/// Reward transaction emitted by the metachain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewardInfo {
    pub round: u64,
    pub epoch: u32,
    pub value: String,
    pub receiver: String,
    pub execution_order: u32,
}

/// Receipt of a transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Receipt {
    pub value: String,
    pub sender: String,
    pub data: String,
    pub tx_hash: String,
}

/// Event emitted by a contract call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Event {
    pub address: String,
    pub identifier: String,
    /// Hex encoded topics
    pub topics: Vec<String>,
    /// Hex encoded data
    pub data: String,
    pub additional_data: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Log {
    pub address: String,
    pub events: Vec<Event>,
}

/// Log attached to a transaction or smart contract result hash
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogData {
    pub tx_hash: String,
    pub log: Log,
}

/// Everything the node executed in one block, keyed by hex hash
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionPool {
    pub transactions: BTreeMap<String, TxInfo>,
    pub smart_contract_results: BTreeMap<String, ScrInfo>,
    pub rewards: BTreeMap<String, RewardInfo>,
    pub invalid_txs: BTreeMap<String, TxInfo>,
    pub receipts: BTreeMap<String, Receipt>,
    pub logs: Vec<LogData>,
}

impl TransactionPool {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
            && self.smart_contract_results.is_empty()
            && self.rewards.is_empty()
            && self.invalid_txs.is_empty()
            && self.receipts.is_empty()
            && self.logs.is_empty()
    }
}

/// One account delta produced by block processing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlteredAccount {
    pub address: String,
    pub is_sender: bool,
    #[serde(rename = "isESDTOperation")]
    pub is_esdt_operation: bool,
    #[serde(rename = "isNFTOperation")]
    pub is_nft_operation: bool,
    pub token_identifier: String,
    pub nonce: String,
    #[serde(rename = "isNFTCreate")]
    pub is_nft_create: bool,
}

impl AlteredAccount {
    /// True when the delta refers to a token balance instead of the native one
    pub fn is_token_operation(&self) -> bool {
        self.is_esdt_operation || self.is_nft_operation
    }
}

/// Metadata of a non fungible token, as stored on chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EsdtMetaData {
    pub nonce: u64,
    pub name: String,
    pub creator: String,
    pub royalties: u32,
    pub hash: String,
    pub uris: Vec<String>,
    pub attributes: String,
}

/// Token balance of an account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EsdtToken {
    pub token: String,
    pub nonce: u64,
    pub value: String,
    pub properties: String,
    pub metadata: Option<EsdtMetaData>,
}

/// Account state after the block was applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserAccount {
    pub address: String,
    pub nonce: u64,
    pub balance: String,
    pub developer_reward: String,
    pub owner_address: String,
    pub user_name: String,
    pub esdt: Vec<EsdtToken>,
}

/// Block-commit event consumed by the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutportBlock {
    pub header_hash: String,
    pub header: Header,
    pub body: Body,
    pub pool: TransactionPool,
    pub altered_accounts: Vec<AlteredAccount>,
    /// State of the altered accounts after the block
    pub accounts: Vec<UserAccount>,
    pub signers_indexes: Vec<u64>,
    pub num_shards: u32,
}

/// Validators public keys of one shard for an epoch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorsPubKeys {
    pub shard_id: u32,
    pub epoch: u32,
    pub public_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorRating {
    pub public_key: String,
    pub rating: f32,
}

/// Ratings of the validators at the end of an epoch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorsRating {
    pub shard_id: u32,
    pub epoch: u32,
    pub ratings: Vec<ValidatorRating>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoundInfo {
    pub round: u64,
    pub signers_indexes: Vec<u64>,
    pub block_was_proposed: bool,
    pub shard_id: u32,
    pub epoch: u32,
    pub timestamp: u64,
}
