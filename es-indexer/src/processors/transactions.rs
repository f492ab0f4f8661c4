//! Transactions, smart contract results and receipts
//!
//! Transactions are grouped per miniblock so that they inherit the miniblock
//! hash and shards. Smart contract results are attached to the transaction
//! that originated them to compute `hasScResults` and the final status.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{index_meta, update_meta};
use crate::core::error::IndexerResult;
use crate::core::types::{
    Body, Header, MiniBlock, MiniBlockType, OutportBlock, ProcessingType, RewardInfo, ScrInfo, TxInfo,
    METACHAIN_SHARD_ID,
};
use crate::data::documents::{Receipt, ScResult, Transaction};
use crate::data::BufferSlice;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_INVALID: &str = "invalid";
pub const STATUS_FAIL: &str = "fail";

const TX_TYPE_NORMAL: &str = "normal";
const TX_TYPE_UNSIGNED: &str = "unsigned";
const REWARDS_OPERATION: &str = "reward";

const AT_SEPARATOR: &str = "@";
const OK_HEX_ENCODED: &str = "6f6b";
const OK_PLAIN: &str = "ok";

/// Documents produced from the transaction pool of one block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedResults {
    pub transactions: Vec<Transaction>,
    pub sc_results: Vec<ScResult>,
    pub receipts: Vec<Receipt>,
}

#[derive(Debug, Default, Clone)]
pub struct TransactionsProcessor;

impl TransactionsProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn prepare_transactions_for_database(&self, outport: &OutportBlock) -> PreparedResults {
        let header = &outport.header;
        let pool = &outport.pool;

        let mut normal: BTreeMap<String, Transaction> = BTreeMap::new();
        let mut rewards: BTreeMap<String, Transaction> = BTreeMap::new();
        for (position, miniblock) in outport.body.miniblocks.iter().enumerate() {
            match miniblock.kind {
                MiniBlockType::TxBlock => {
                    if is_processed_miniblock(header, position) {
                        continue;
                    }
                    let status = compute_status(header.shard_id, miniblock.receiver_shard_id);
                    for hash in &miniblock.tx_hashes {
                        if let Some(info) = pool.transactions.get(hash) {
                            normal.insert(hash.clone(), prepare_transaction(hash, info, miniblock, header, status));
                        }
                    }
                }
                MiniBlockType::InvalidBlock => {
                    for hash in &miniblock.tx_hashes {
                        if let Some(info) = pool.invalid_txs.get(hash) {
                            normal.insert(
                                hash.clone(),
                                prepare_transaction(hash, info, miniblock, header, STATUS_INVALID),
                            );
                        }
                    }
                }
                MiniBlockType::RewardsBlock => {
                    let status = compute_status(header.shard_id, miniblock.receiver_shard_id);
                    for hash in &miniblock.tx_hashes {
                        if let Some(reward) = pool.rewards.get(hash) {
                            rewards.insert(hash.clone(), prepare_reward(hash, reward, miniblock, header, status));
                        }
                    }
                }
                _ => {}
            }
        }

        for (order, transaction) in normal.values_mut().enumerate() {
            transaction.search_order = u32::try_from(order).unwrap_or(u32::MAX);
        }

        let sc_results = process_sc_results(&outport.body, header, &pool.smart_contract_results);
        let without_tx = attach_sc_results(&mut normal, &sc_results);
        if without_tx > 0 {
            debug!(
                target: "es_indexer::processors::transactions",
                "{} smart contract results without transaction in this block", without_tx
            );
        }

        let receipts = pool
            .receipts
            .iter()
            .map(|(hash, receipt)| Receipt {
                hash: hash.clone(),
                value: receipt.value.clone(),
                sender: receipt.sender.clone(),
                data: receipt.data.clone(),
                tx_hash: receipt.tx_hash.clone(),
                timestamp: header.timestamp,
            })
            .collect();

        PreparedResults {
            transactions: normal.into_values().chain(rewards.into_values()).collect(),
            sc_results,
            receipts,
        }
    }

    /// Hashes of the transactions and of the smart contract results this shard wrote
    pub fn get_hex_encoded_hashes_for_remove(&self, header: &Header, body: &Body) -> (Vec<String>, Vec<String>) {
        if header.miniblock_headers.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let mut txs = Vec::new();
        let mut scrs = Vec::new();
        for (position, miniblock) in body.miniblocks.iter().enumerate() {
            if is_processed_miniblock(header, position)
                || is_cross_shard_at_source_normal_tx(header.shard_id, miniblock)
            {
                continue;
            }

            if miniblock.kind == MiniBlockType::SmartContractResultBlock {
                scrs.extend(miniblock.tx_hashes.iter().cloned());
            } else {
                txs.extend(miniblock.tx_hashes.iter().cloned());
            }
        }

        (txs, scrs)
    }

    /// Cross shard transactions are written by the source shard only if the
    /// destination did not write them first
    pub fn serialize_transactions(
        &self,
        transactions: &[Transaction],
        self_shard: u32,
        buffer: &mut BufferSlice,
        index: &str,
    ) -> IndexerResult<()> {
        for transaction in transactions {
            let doc = serde_json::to_vec(transaction)?;
            let on_source = is_cross_shard_on_source(transaction.sender_shard, transaction.receiver_shard, self_shard);
            put_document(buffer, index, &transaction.hash, &doc, on_source);
        }
        Ok(())
    }

    pub fn serialize_sc_results(&self, sc_results: &[ScResult], buffer: &mut BufferSlice, index: &str) -> IndexerResult<()> {
        for sc_result in sc_results {
            let doc = serde_json::to_vec(sc_result)?;
            buffer.put_data(&index_meta(index, &sc_result.hash), &doc);
        }
        Ok(())
    }

    pub fn serialize_receipts(&self, receipts: &[Receipt], buffer: &mut BufferSlice, index: &str) -> IndexerResult<()> {
        for receipt in receipts {
            let doc = serde_json::to_vec(receipt)?;
            buffer.put_data(&index_meta(index, &receipt.hash), &doc);
        }
        Ok(())
    }

    /// Transactions and smart contract results together in one index
    pub fn serialize_operations(
        &self,
        results: &PreparedResults,
        self_shard: u32,
        buffer: &mut BufferSlice,
        index: &str,
    ) -> IndexerResult<()> {
        for transaction in &results.transactions {
            let mut operation = transaction.clone();
            operation.kind = TX_TYPE_NORMAL.to_string();

            let doc = serde_json::to_vec(&operation)?;
            let on_source = is_cross_shard_on_source(operation.sender_shard, operation.receiver_shard, self_shard);
            put_document(buffer, index, &operation.hash, &doc, on_source);
        }

        for sc_result in &results.sc_results {
            let mut operation = sc_result.clone();
            operation.kind = TX_TYPE_UNSIGNED.to_string();
            operation.status = compute_status(self_shard, operation.receiver_shard).to_string();
            operation.can_be_ignored = operation.data.starts_with(&format!("{}{}", AT_SEPARATOR, OK_HEX_ENCODED));

            let doc = serde_json::to_vec(&operation)?;
            let on_source = is_cross_shard_on_source(operation.sender_shard, operation.receiver_shard, self_shard);
            put_document(buffer, index, &operation.hash, &doc, on_source);
        }

        Ok(())
    }
}

/// Documents known only on the source shard are upserted so that they never
/// overwrite what the destination shard indexed
fn put_document(buffer: &mut BufferSlice, index: &str, id: &str, doc: &[u8], on_source: bool) {
    if on_source {
        let upsert = format!(
            "{{\"script\":{{\"source\":\"return\"}},\"upsert\":{}}}",
            String::from_utf8_lossy(doc)
        );
        buffer.put_data(&update_meta(index, id), upsert.as_bytes());
        return;
    }

    buffer.put_data(&index_meta(index, id), doc);
}

pub fn compute_status(self_shard: u32, receiver_shard: u32) -> &'static str {
    if self_shard == receiver_shard {
        STATUS_SUCCESS
    } else {
        STATUS_PENDING
    }
}

fn is_cross_shard_on_source(sender_shard: u32, receiver_shard: u32, self_shard: u32) -> bool {
    sender_shard != receiver_shard && sender_shard == self_shard
}

fn is_cross_shard_at_source_normal_tx(self_shard: u32, miniblock: &MiniBlock) -> bool {
    miniblock.kind == MiniBlockType::TxBlock
        && is_cross_shard_on_source(miniblock.sender_shard_id, miniblock.receiver_shard_id, self_shard)
}

/// Scheduled miniblocks are indexed when proposed, not again once processed
fn is_processed_miniblock(header: &Header, position: usize) -> bool {
    header
        .miniblock_headers
        .get(position)
        .map(|miniblock_header| miniblock_header.processing_type == ProcessingType::Processed)
        .unwrap_or_default()
}

fn is_sc_result_successful(data: &str) -> bool {
    data.contains(&format!("{}{}", AT_SEPARATOR, OK_HEX_ENCODED)) || data.contains(&format!("{}{}", AT_SEPARATOR, OK_PLAIN))
}

fn prepare_transaction(hash: &str, info: &TxInfo, miniblock: &MiniBlock, header: &Header, status: &str) -> Transaction {
    let tx = &info.transaction;
    Transaction {
        hash: hash.to_string(),
        mini_block_hash: miniblock.hash.clone(),
        nonce: tx.nonce,
        round: header.round,
        value: tx.value.clone(),
        receiver: tx.receiver.clone(),
        sender: tx.sender.clone(),
        receiver_shard: miniblock.receiver_shard_id,
        sender_shard: miniblock.sender_shard_id,
        gas_price: tx.gas_price,
        gas_limit: tx.gas_limit,
        gas_used: info.fee_info.gas_used,
        fee: info.fee_info.fee.clone(),
        initial_paid_fee: info.fee_info.initial_paid_fee.clone(),
        data: tx.data.clone(),
        signature: tx.signature.clone(),
        timestamp: header.timestamp,
        status: status.to_string(),
        sender_user_name: tx.sender_user_name.clone(),
        receiver_user_name: tx.receiver_user_name.clone(),
        guardian: tx.guardian.clone(),
        kind: TX_TYPE_NORMAL.to_string(),
        epoch: header.epoch,
        ..Default::default()
    }
}

fn prepare_reward(hash: &str, reward: &RewardInfo, miniblock: &MiniBlock, header: &Header, status: &str) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        mini_block_hash: miniblock.hash.clone(),
        round: reward.round,
        value: reward.value.clone(),
        receiver: reward.receiver.clone(),
        sender: METACHAIN_SHARD_ID.to_string(),
        receiver_shard: miniblock.receiver_shard_id,
        sender_shard: miniblock.sender_shard_id,
        timestamp: header.timestamp,
        status: status.to_string(),
        kind: TX_TYPE_NORMAL.to_string(),
        operation: REWARDS_OPERATION.to_string(),
        epoch: reward.epoch,
        ..Default::default()
    }
}

fn prepare_sc_result(
    hash: &str,
    info: &ScrInfo,
    miniblock_hash: &str,
    sender_shard: u32,
    receiver_shard: u32,
    header: &Header,
) -> ScResult {
    let scr = &info.smart_contract_result;
    ScResult {
        hash: hash.to_string(),
        mini_block_hash: miniblock_hash.to_string(),
        nonce: scr.nonce,
        gas_limit: scr.gas_limit,
        gas_price: scr.gas_price,
        value: scr.value.clone(),
        sender: scr.sender.clone(),
        receiver: scr.receiver.clone(),
        sender_shard,
        receiver_shard,
        relayer_addr: scr.relayer.clone(),
        relayed_value: scr.relayed_value.clone(),
        code: scr.code.clone(),
        data: scr.data.clone(),
        prev_tx_hash: scr.prev_tx_hash.clone(),
        original_tx_hash: scr.original_tx_hash.clone(),
        call_type: scr.call_type.to_string(),
        code_metadata: scr.code_metadata.clone(),
        return_message: scr.return_message.clone(),
        timestamp: header.timestamp,
        original_sender: scr.original_sender.clone(),
        epoch: header.epoch,
        ..Default::default()
    }
}

/// Results listed in a miniblock first, then the ones produced without one
fn process_sc_results(body: &Body, header: &Header, pool: &BTreeMap<String, ScrInfo>) -> Vec<ScResult> {
    let mut remaining: BTreeMap<&str, &ScrInfo> = pool.iter().map(|(hash, info)| (hash.as_str(), info)).collect();
    let mut results = Vec::with_capacity(pool.len());

    for miniblock in body
        .miniblocks
        .iter()
        .filter(|miniblock| miniblock.kind == MiniBlockType::SmartContractResultBlock)
    {
        for hash in &miniblock.tx_hashes {
            let Some(info) = remaining.remove(hash.as_str()) else {
                warn!(
                    target: "es_indexer::processors::transactions",
                    "smart contract result {} not found in pool", hash
                );
                continue;
            };
            results.push(prepare_sc_result(
                hash,
                info,
                &miniblock.hash,
                miniblock.sender_shard_id,
                miniblock.receiver_shard_id,
                header,
            ));
        }
    }

    for (hash, info) in remaining {
        results.push(prepare_sc_result(hash, info, "", header.shard_id, header.shard_id, header));
    }

    results
}

/// Attach results to their originating transaction; returns how many have no transaction here
fn attach_sc_results(transactions: &mut BTreeMap<String, Transaction>, sc_results: &[ScResult]) -> usize {
    let mut without_tx = 0;
    for sc_result in sc_results {
        let Some(transaction) = transactions.get_mut(&sc_result.original_tx_hash) else {
            without_tx += 1;
            continue;
        };

        transaction.has_sc_results = true;
        let is_direct_failure = sc_result.prev_tx_hash == transaction.hash
            && sc_result.data.starts_with(AT_SEPARATOR)
            && !is_sc_result_successful(&sc_result.data);
        if is_direct_failure && transaction.status != STATUS_INVALID {
            transaction.status = STATUS_FAIL.to_string();
        }
    }

    without_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        FeeInfo, MiniBlockHeader, Receipt as PoolReceipt, SmartContractResult, Transaction as PoolTransaction,
        TransactionPool,
    };

    fn miniblock(hash: &str, kind: MiniBlockType, sender: u32, receiver: u32, txs: &[&str]) -> MiniBlock {
        MiniBlock {
            hash: hash.to_string(),
            sender_shard_id: sender,
            receiver_shard_id: receiver,
            kind,
            tx_hashes: txs.iter().map(|tx| tx.to_string()).collect(),
        }
    }

    fn tx_info(sender: &str) -> TxInfo {
        TxInfo {
            transaction: PoolTransaction {
                nonce: 1,
                value: "10".to_string(),
                sender: sender.to_string(),
                receiver: "erd1receiver".to_string(),
                gas_limit: 50_000,
                gas_price: 1_000_000_000,
                ..Default::default()
            },
            fee_info: FeeInfo {
                gas_used: 50_000,
                fee: "50000000000000".to_string(),
                initial_paid_fee: "50000000000000".to_string(),
            },
            execution_order: 0,
        }
    }

    fn scr(original: &str, prev: &str, data: &str) -> ScrInfo {
        ScrInfo {
            smart_contract_result: SmartContractResult {
                original_tx_hash: original.to_string(),
                prev_tx_hash: prev.to_string(),
                data: data.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn outport(shard_id: u32, miniblocks: Vec<MiniBlock>, pool: TransactionPool) -> OutportBlock {
        OutportBlock {
            header_hash: "hdr".to_string(),
            header: Header {
                shard_id,
                round: 9,
                epoch: 1,
                timestamp: 1000,
                miniblock_headers: miniblocks.iter().map(|_| MiniBlockHeader::default()).collect(),
                ..Default::default()
            },
            body: Body { miniblocks },
            pool,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_and_search_order() {
        let mut pool = TransactionPool::default();
        pool.transactions.insert("t1".to_string(), tx_info("a"));
        pool.transactions.insert("t2".to_string(), tx_info("b"));
        pool.invalid_txs.insert("t3".to_string(), tx_info("c"));

        let outport = outport(
            0,
            vec![
                miniblock("mb1", MiniBlockType::TxBlock, 0, 0, &["t1"]),
                miniblock("mb2", MiniBlockType::TxBlock, 0, 1, &["t2"]),
                miniblock("mb3", MiniBlockType::InvalidBlock, 0, 0, &["t3"]),
            ],
            pool,
        );

        let results = TransactionsProcessor::new().prepare_transactions_for_database(&outport);
        let statuses: Vec<(&str, &str, u32)> = results
            .transactions
            .iter()
            .map(|tx| (tx.hash.as_str(), tx.status.as_str(), tx.search_order))
            .collect();
        assert_eq!(
            statuses,
            vec![("t1", "success", 0), ("t2", "pending", 1), ("t3", "invalid", 2)]
        );
        assert_eq!(results.transactions[1].mini_block_hash, "mb2");
        assert_eq!(results.transactions[1].receiver_shard, 1);
        assert_eq!(results.transactions[0].gas_used, 50_000);
    }

    #[test]
    fn test_sc_results_are_attached() {
        let mut pool = TransactionPool::default();
        pool.transactions.insert("t1".to_string(), tx_info("a"));
        pool.transactions.insert("t2".to_string(), tx_info("b"));
        pool.smart_contract_results
            .insert("s1".to_string(), scr("t1", "t1", "@6f6b"));
        pool.smart_contract_results
            .insert("s2".to_string(), scr("t2", "t2", "@75736572206572726f72"));
        pool.smart_contract_results
            .insert("s3".to_string(), scr("elsewhere", "elsewhere", ""));

        let outport = outport(
            0,
            vec![
                miniblock("mb1", MiniBlockType::TxBlock, 0, 0, &["t1", "t2"]),
                miniblock("mbs", MiniBlockType::SmartContractResultBlock, 0, 0, &["s1", "s2"]),
            ],
            pool,
        );

        let results = TransactionsProcessor::new().prepare_transactions_for_database(&outport);
        assert_eq!(results.sc_results.len(), 3);
        assert_eq!(results.sc_results[0].mini_block_hash, "mbs");
        assert_eq!(results.sc_results[2].hash, "s3");
        assert!(results.sc_results[2].mini_block_hash.is_empty());

        let t1 = &results.transactions[0];
        assert!(t1.has_sc_results);
        assert_eq!(t1.status, "success");

        let t2 = &results.transactions[1];
        assert!(t2.has_sc_results);
        assert_eq!(t2.status, "fail");
    }

    #[test]
    fn test_rewards_and_receipts() {
        let mut pool = TransactionPool::default();
        pool.rewards.insert(
            "r1".to_string(),
            RewardInfo {
                round: 8,
                epoch: 1,
                value: "100".to_string(),
                receiver: "erd1validator".to_string(),
                execution_order: 0,
            },
        );
        pool.receipts.insert(
            "rc1".to_string(),
            PoolReceipt {
                value: "5".to_string(),
                sender: "erd1sender".to_string(),
                data: "refund".to_string(),
                tx_hash: "t1".to_string(),
            },
        );

        let outport = outport(
            0,
            vec![miniblock("mbr", MiniBlockType::RewardsBlock, METACHAIN_SHARD_ID, 0, &["r1"])],
            pool,
        );

        let results = TransactionsProcessor::new().prepare_transactions_for_database(&outport);
        let reward = &results.transactions[0];
        assert_eq!(reward.sender, "4294967295");
        assert_eq!(reward.operation, "reward");
        assert_eq!(reward.status, "success");
        assert_eq!(reward.round, 8);

        assert_eq!(results.receipts.len(), 1);
        assert_eq!(results.receipts[0].hash, "rc1");
        assert_eq!(results.receipts[0].timestamp, 1000);
    }

    #[test]
    fn test_processed_miniblocks_are_skipped() {
        let mut pool = TransactionPool::default();
        pool.transactions.insert("t1".to_string(), tx_info("a"));

        let mut outport = outport(0, vec![miniblock("mb1", MiniBlockType::TxBlock, 0, 0, &["t1"])], pool);
        outport.header.miniblock_headers[0].processing_type = ProcessingType::Processed;

        let processor = TransactionsProcessor::new();
        assert!(processor.prepare_transactions_for_database(&outport).transactions.is_empty());
        let (txs, scrs) = processor.get_hex_encoded_hashes_for_remove(&outport.header, &outport.body);
        assert!(txs.is_empty());
        assert!(scrs.is_empty());
    }

    #[test]
    fn test_hashes_for_remove() {
        let outport = outport(
            0,
            vec![
                miniblock("a", MiniBlockType::TxBlock, 0, 0, &["t1"]),
                miniblock("b", MiniBlockType::TxBlock, 0, 1, &["t2"]),
                miniblock("c", MiniBlockType::TxBlock, 1, 0, &["t3"]),
                miniblock("d", MiniBlockType::SmartContractResultBlock, 0, 1, &["s1"]),
            ],
            TransactionPool::default(),
        );

        let (txs, scrs) =
            TransactionsProcessor::new().get_hex_encoded_hashes_for_remove(&outport.header, &outport.body);
        assert_eq!(txs, vec!["t1", "t3"]);
        assert_eq!(scrs, vec!["s1"]);
    }

    #[test]
    fn test_serialize_cross_shard_on_source_is_upsert() {
        let transactions = vec![
            Transaction {
                hash: "t1".to_string(),
                sender_shard: 0,
                receiver_shard: 1,
                ..Default::default()
            },
            Transaction {
                hash: "t2".to_string(),
                sender_shard: 1,
                receiver_shard: 0,
                ..Default::default()
            },
        ];

        let mut buffer = BufferSlice::default();
        TransactionsProcessor::new()
            .serialize_transactions(&transactions, 0, &mut buffer, "transactions")
            .unwrap();

        let body = String::from_utf8(buffer.buffers()[0].clone()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "{ \"update\" : {\"_index\":\"transactions\", \"_id\" : \"t1\" } }");
        assert!(lines[1].starts_with("{\"script\":{\"source\":\"return\"},\"upsert\":{"));
        assert_eq!(lines[2], "{ \"index\" : { \"_index\":\"transactions\", \"_id\" : \"t2\" } }");
        assert!(!lines[3].contains("\"hash\""));
    }

    #[test]
    fn test_serialize_operations() {
        let results = PreparedResults {
            transactions: vec![Transaction {
                hash: "t1".to_string(),
                ..Default::default()
            }],
            sc_results: vec![ScResult {
                hash: "s1".to_string(),
                receiver_shard: 1,
                data: "@6f6b".to_string(),
                ..Default::default()
            }],
            receipts: Vec::new(),
        };

        let mut buffer = BufferSlice::default();
        TransactionsProcessor::new()
            .serialize_operations(&results, 1, &mut buffer, "operations")
            .unwrap();

        let body = String::from_utf8(buffer.buffers()[0].clone()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        let scr: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(scr["type"], "unsigned");
        assert_eq!(scr["status"], "success");
        assert_eq!(scr["canBeIgnored"], true);
    }
}
