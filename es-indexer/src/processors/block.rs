//! Block and epoch info documents

use tracing::debug;

use super::index_meta;
use crate::core::error::{IndexerResult, ProcessorError};
use crate::core::types::{Header, MiniBlockType, OutportBlock, METACHAIN_SHARD_ID};
use crate::data::documents::{Block, EpochInfo};
use crate::data::BufferSlice;

#[derive(Debug, Default, Clone)]
pub struct BlockProcessor;

impl BlockProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Build the `blocks` document of a committed block
    pub fn prepare_block_for_db(&self, outport: &OutportBlock) -> IndexerResult<Block> {
        if outport.header_hash.is_empty() {
            return Err(ProcessorError::MissingComponent("header hash").into());
        }

        let header = &outport.header;
        Ok(Block {
            hash: outport.header_hash.clone(),
            nonce: header.nonce,
            round: header.round,
            epoch: header.epoch,
            mini_blocks_hashes: outport
                .body
                .miniblocks
                .iter()
                .map(|miniblock| miniblock.hash.clone())
                .collect(),
            notarized_blocks_hashes: header.notarized_blocks_hashes.clone(),
            proposer: outport.signers_indexes.first().copied().unwrap_or_default(),
            validators: outport.signers_indexes.clone(),
            pub_key_bitmap: header.pub_key_bitmap.clone(),
            size: header.size,
            size_txs: header.size_txs,
            timestamp: header.timestamp,
            state_root_hash: header.state_root_hash.clone(),
            prev_hash: header.prev_hash.clone(),
            shard_id: header.shard_id,
            tx_count: txs_count(header),
            accumulated_fees: header.accumulated_fees.clone(),
            developer_fees: header.developer_fees.clone(),
            epoch_start_block: header.is_start_of_epoch,
            search_order: compute_block_search_order(header),
        })
    }

    pub fn serialize_block(&self, block: &Block, buffer: &mut BufferSlice, index: &str) -> IndexerResult<()> {
        let doc = serde_json::to_vec(block)?;
        buffer.put_data(&index_meta(index, &block.hash), &doc);
        Ok(())
    }

    /// Fees accumulated in the epoch, keyed by epoch; only metachain headers carry them
    pub fn serialize_epoch_info(&self, header: &Header, buffer: &mut BufferSlice, index: &str) -> IndexerResult<()> {
        if !header.is_metachain() {
            return Err(ProcessorError::InvalidShard(header.shard_id).into());
        }

        let epoch_info = EpochInfo {
            accumulated_fees: header.accumulated_fees_in_epoch.clone(),
            developer_fees: header.dev_fees_in_epoch.clone(),
        };
        let doc = serde_json::to_vec(&epoch_info)?;
        buffer.put_data(&index_meta(index, &header.epoch.to_string()), &doc);
        Ok(())
    }
}

/// Metachain blocks count only the transactions they execute themselves
fn txs_count(header: &Header) -> u32 {
    if !header.is_metachain() {
        return header.tx_count;
    }

    header
        .miniblock_headers
        .iter()
        .filter(|miniblock| miniblock.kind != MiniBlockType::PeerBlock)
        .map(|miniblock| miniblock.tx_count)
        .sum()
}

fn shard_identifier(shard_id: u32) -> u32 {
    if shard_id == METACHAIN_SHARD_ID {
        return 1;
    }
    shard_id + 2
}

/// Sort key that orders blocks by shard and then by nonce: `1<shard:02><nonce>`
pub fn compute_block_search_order(header: &Header) -> u64 {
    let order = format!("1{:02}{}", shard_identifier(header.shard_id), header.nonce);
    match order.parse() {
        Ok(order) => order,
        Err(err) => {
            debug!(target: "es_indexer::processors::block", "cannot compute search order: {}", err);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Body, MiniBlock, MiniBlockHeader};

    fn outport() -> OutportBlock {
        OutportBlock {
            header_hash: "aabb".to_string(),
            header: Header {
                nonce: 37,
                round: 40,
                epoch: 2,
                shard_id: 1,
                timestamp: 1_650_000_000,
                tx_count: 5,
                accumulated_fees: "100".to_string(),
                developer_fees: "10".to_string(),
                ..Default::default()
            },
            body: Body {
                miniblocks: vec![MiniBlock {
                    hash: "mb1".to_string(),
                    ..Default::default()
                }],
            },
            signers_indexes: vec![3, 4, 5],
            ..Default::default()
        }
    }

    #[test]
    fn test_prepare_block() {
        let block = BlockProcessor::new().prepare_block_for_db(&outport()).unwrap();

        assert_eq!(block.hash, "aabb");
        assert_eq!(block.proposer, 3);
        assert_eq!(block.validators, vec![3, 4, 5]);
        assert_eq!(block.mini_blocks_hashes, vec!["mb1"]);
        assert_eq!(block.tx_count, 5);
        assert_eq!(block.search_order, 10337);
    }

    #[test]
    fn test_missing_hash_is_rejected() {
        let mut outport = outport();
        outport.header_hash.clear();
        assert!(BlockProcessor::new().prepare_block_for_db(&outport).is_err());
    }

    #[test]
    fn test_search_order() {
        let mut header = Header {
            nonce: 5,
            shard_id: METACHAIN_SHARD_ID,
            ..Default::default()
        };
        assert_eq!(compute_block_search_order(&header), 1015);

        header.shard_id = 0;
        assert_eq!(compute_block_search_order(&header), 1025);

        header.shard_id = 12;
        header.nonce = 1;
        assert_eq!(compute_block_search_order(&header), 1141);
    }

    #[test]
    fn test_metachain_tx_count_skips_peer_miniblocks() {
        let header = Header {
            shard_id: METACHAIN_SHARD_ID,
            tx_count: 100,
            miniblock_headers: vec![
                MiniBlockHeader {
                    tx_count: 4,
                    kind: MiniBlockType::PeerBlock,
                    ..Default::default()
                },
                MiniBlockHeader {
                    tx_count: 6,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(txs_count(&header), 6);
    }

    #[test]
    fn test_serialize_block_and_epoch_info() {
        let processor = BlockProcessor::new();
        let block = processor.prepare_block_for_db(&outport()).unwrap();

        let mut buffer = BufferSlice::default();
        processor.serialize_block(&block, &mut buffer, "blocks").unwrap();
        let body = String::from_utf8(buffer.buffers()[0].clone()).unwrap();
        assert!(body.starts_with("{ \"index\" : { \"_index\":\"blocks\", \"_id\" : \"aabb\" } }\n"));
        assert!(body.contains("\"searchOrder\":10337"));
        assert!(!body.contains("\"hash\""));

        assert!(processor
            .serialize_epoch_info(&outport().header, &mut buffer, "epochinfo")
            .is_err());

        let meta_header = Header {
            shard_id: METACHAIN_SHARD_ID,
            epoch: 7,
            accumulated_fees_in_epoch: "500".to_string(),
            dev_fees_in_epoch: "50".to_string(),
            ..Default::default()
        };
        let mut buffer = BufferSlice::default();
        processor
            .serialize_epoch_info(&meta_header, &mut buffer, "epochinfo")
            .unwrap();
        assert_eq!(
            String::from_utf8(buffer.buffers()[0].clone()).unwrap(),
            "{ \"index\" : { \"_index\":\"epochinfo\", \"_id\" : \"7\" } }\n{\"accumulatedFees\":\"500\",\"developerFees\":\"50\"}\n"
        );
    }
}
