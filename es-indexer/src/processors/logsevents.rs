//! Logs, events and the token information carried by events

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::transactions::PreparedResults;
use super::update_meta;
use crate::converters::{compute_token_identifier, format_painless_source};
use crate::core::error::IndexerResult;
use crate::core::types::{Event, LogData, OutportBlock};
use crate::data::documents::{LogEntryEvent, LogEvent, Logs, TokenInfo};
use crate::data::BufferSlice;

const NUM_ISSUE_LOG_TOPICS: usize = 4;
const NUM_NFT_CREATE_TOPICS: usize = 2;

const ISSUE_IDENTIFIERS: [&str; 4] = ["issue", "issueSemiFungible", "issueNonFungible", "registerMetaESDT"];
const NFT_CREATE_IDENTIFIER: &str = "ESDTNFTCreate";

const UPSERT_LOG_SCRIPT: &str = "
    if ('create' == ctx.op) {
        ctx._source = params.log
    } else {
        if (ctx._source.containsKey('timestamp')) {
            if (ctx._source.timestamp <= params.log.timestamp) {
                ctx._source = params.log
            }
        } else {
            ctx._source = params.log
        }
    }
";

const UPSERT_EVENT_SCRIPT: &str = "
    if ('create' == ctx.op) {
        ctx._source = params.event
    } else {
        if (ctx._source.containsKey('timestamp')) {
            if (ctx._source.timestamp <= params.event.timestamp) {
                ctx._source = params.event
            }
        } else {
            ctx._source = params.event
        }
    }
";

/// Documents extracted from the logs of one block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogsAndEventsResult {
    pub logs: Vec<Logs>,
    pub events: Vec<LogEvent>,
    /// Tokens registered by issue events
    pub tokens: Vec<TokenInfo>,
    /// Non fungible tokens created in the block
    pub nft_created: Vec<TokenInfo>,
}

#[derive(Debug, Default, Clone)]
pub struct LogsAndEventsProcessor;

impl LogsAndEventsProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Build log and event documents and mark the transactions that produced logs
    pub fn extract_data_from_logs(&self, outport: &OutportBlock, results: &mut PreparedResults) -> LogsAndEventsResult {
        let header = &outport.header;
        let original_hashes: HashMap<&str, &str> = results
            .sc_results
            .iter()
            .map(|scr| (scr.hash.as_str(), scr.original_tx_hash.as_str()))
            .collect();

        let mut extracted = LogsAndEventsResult::default();
        for log_data in &outport.pool.logs {
            let original_tx_hash = original_hashes
                .get(log_data.tx_hash.as_str())
                .map(|hash| hash.to_string())
                .unwrap_or_default();
            let tx_order = execution_order(outport, &log_data.tx_hash);

            let (log, events) = prepare_log(log_data, original_tx_hash, tx_order, header.timestamp, header.shard_id);
            extracted.logs.push(log);
            extracted.events.extend(events);

            for event in &log_data.log.events {
                if let Some(token) = issued_token(event, header.timestamp) {
                    extracted.tokens.push(token);
                } else if let Some(token) = created_nft(event, header.timestamp) {
                    extracted.nft_created.push(token);
                }
            }
        }

        let with_logs: HashSet<&str> = outport.pool.logs.iter().map(|log| log.tx_hash.as_str()).collect();
        for transaction in results.transactions.iter_mut() {
            transaction.has_logs |= with_logs.contains(transaction.hash.as_str());
        }

        extracted
    }

    pub fn serialize_logs(&self, logs: &[Logs], buffer: &mut BufferSlice, index: &str) -> IndexerResult<()> {
        for log in logs {
            let doc = serde_json::to_string(log)?;
            let body = format!(
                "{{\"scripted_upsert\": true, \"script\": {{\"source\": \"{}\",\"lang\": \"painless\",\"params\": {{ \"log\": {} }}}},\"upsert\": {{}}}}",
                format_painless_source(UPSERT_LOG_SCRIPT),
                doc
            );
            buffer.put_data(&update_meta(index, &log.id), body.as_bytes());
        }
        Ok(())
    }

    pub fn serialize_events(&self, events: &[LogEvent], buffer: &mut BufferSlice, index: &str) -> IndexerResult<()> {
        for event in events {
            let doc = serde_json::to_string(event)?;
            let body = format!(
                "{{\"scripted_upsert\": true, \"script\": {{\"source\": \"{}\",\"lang\": \"painless\",\"params\": {{ \"event\": {} }}}},\"upsert\": {{}}}}",
                format_painless_source(UPSERT_EVENT_SCRIPT),
                doc
            );
            buffer.put_data(&update_meta(index, &event.id), body.as_bytes());
        }
        Ok(())
    }
}

fn execution_order(outport: &OutportBlock, hash: &str) -> u32 {
    let pool = &outport.pool;
    if let Some(tx) = pool.transactions.get(hash) {
        return tx.execution_order;
    }
    if let Some(scr) = pool.smart_contract_results.get(hash) {
        return scr.execution_order;
    }

    debug!(target: "es_indexer::processors::logsevents", "no execution order for {}", hash);
    0
}

fn prepare_log(
    log_data: &LogData,
    original_tx_hash: String,
    tx_order: u32,
    timestamp: u64,
    shard_id: u32,
) -> (Logs, Vec<LogEvent>) {
    let mut log = Logs {
        id: log_data.tx_hash.clone(),
        original_tx_hash,
        address: log_data.log.address.clone(),
        events: Vec::with_capacity(log_data.log.events.len()),
        timestamp,
    };

    let mut events = Vec::with_capacity(log_data.log.events.len());
    for (order, event) in log_data.log.events.iter().enumerate() {
        log.events.push(LogEntryEvent {
            address: event.address.clone(),
            identifier: event.identifier.clone(),
            topics: event.topics.clone(),
            data: event.data.clone(),
            additional_data: event.additional_data.clone(),
            order,
        });

        events.push(LogEvent {
            id: format!("{}-{}-{}", log.id, shard_id, order),
            tx_hash: log.id.clone(),
            original_tx_hash: log.original_tx_hash.clone(),
            log_address: log.address.clone(),
            address: event.address.clone(),
            identifier: event.identifier.clone(),
            shard_id,
            data: event.data.clone(),
            additional_data: event.additional_data.clone(),
            topics: event.topics.clone(),
            order,
            tx_order,
            timestamp,
        });
    }

    (log, events)
}

fn decode_topic(topic: &str) -> Option<Vec<u8>> {
    match hex::decode(topic) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            warn!(target: "es_indexer::processors::logsevents", "cannot decode topic {}: {}", topic, err);
            None
        }
    }
}

fn decode_topic_string(topic: &str) -> Option<String> {
    decode_topic(topic).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Big-endian nonce, `None` when it does not fit 64 bits
fn decode_nonce(topic: &str) -> Option<u64> {
    let bytes = decode_topic(topic)?;
    let significant: Vec<u8> = bytes.into_iter().skip_while(|byte| *byte == 0).collect();
    if significant.len() > 8 {
        return None;
    }

    Some(significant.iter().fold(0u64, |nonce, byte| (nonce << 8) | u64::from(*byte)))
}

/// `[token, name, ticker, type, ...]`
fn issued_token(event: &Event, timestamp: u64) -> Option<TokenInfo> {
    if !ISSUE_IDENTIFIERS.contains(&event.identifier.as_str()) || event.topics.len() < NUM_ISSUE_LOG_TOPICS {
        return None;
    }

    let token = decode_topic_string(&event.topics[0])?;
    if token.is_empty() {
        return None;
    }

    Some(TokenInfo {
        identifier: token.clone(),
        token,
        name: decode_topic_string(&event.topics[1])?,
        ticker: decode_topic_string(&event.topics[2])?,
        kind: decode_topic_string(&event.topics[3])?,
        issuer: event.address.clone(),
        current_owner: event.address.clone(),
        timestamp,
        ..Default::default()
    })
}

/// `[token, nonce, ...]`; a zero nonce is a fungible mint and yields nothing
fn created_nft(event: &Event, timestamp: u64) -> Option<TokenInfo> {
    if event.identifier != NFT_CREATE_IDENTIFIER || event.topics.len() < NUM_NFT_CREATE_TOPICS {
        return None;
    }

    let token = decode_topic_string(&event.topics[0])?;
    let nonce = decode_nonce(&event.topics[1])?;
    if nonce == 0 {
        return None;
    }

    Some(TokenInfo {
        identifier: compute_token_identifier(&token, nonce),
        token,
        nonce,
        current_owner: event.address.clone(),
        timestamp,
        ..Default::default()
    })
}
