//! Miniblock documents
//!
//! A cross shard miniblock is seen twice: once by the sender shard and once by
//! the receiver shard. The first sighting indexes the whole document, the
//! second only fills in its own block hash and processing type.

use std::collections::HashSet;

use super::{index_meta, update_meta};
use crate::converters::format_painless_source;
use crate::core::error::IndexerResult;
use crate::core::types::{Body, Header, MiniBlock, MiniBlockType, OutportBlock, ProcessingType, ALL_SHARD_ID};
use crate::data::documents::Miniblock;
use crate::data::BufferSlice;

const UPDATE_MINIBLOCK_SCRIPT: &str = "
    if ('create' == ctx.op) {
        ctx._source = params.mb
    } else {
        if (params.osnp) {
            ctx._source.senderBlockHash = params.mb.senderBlockHash;
            ctx._source.procTypeS = params.mb.procTypeS;
        } else {
            ctx._source.receiverBlockHash = params.mb.receiverBlockHash;
            ctx._source.procTypeD = params.mb.procTypeD;
        }
    }
";

#[derive(Debug, Default, Clone)]
pub struct MiniblocksProcessor;

impl MiniblocksProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Documents of the miniblocks in the block body
    pub fn prepare_db_miniblocks(&self, outport: &OutportBlock) -> Vec<Miniblock> {
        let header = &outport.header;
        outport
            .body
            .miniblocks
            .iter()
            .enumerate()
            // miniblocks for every shard are indexed by the metachain only
            .filter(|(_, miniblock)| {
                miniblock.receiver_shard_id != ALL_SHARD_ID || header.is_metachain()
            })
            .map(|(position, miniblock)| prepare_miniblock(position, miniblock, header, &outport.header_hash))
            .collect()
    }

    /// Hashes of the miniblocks this shard wrote, used when the block is reverted
    pub fn get_miniblocks_hashes_hex_encoded(&self, header: &Header, body: &Body) -> Vec<String> {
        if header.miniblock_headers.is_empty() {
            return Vec::new();
        }

        body.miniblocks
            .iter()
            .filter(|miniblock| miniblock.kind != MiniBlockType::PeerBlock)
            .filter(|miniblock| {
                let is_cross_shard = miniblock.sender_shard_id != miniblock.receiver_shard_id;
                !(is_cross_shard && miniblock.receiver_shard_id == header.shard_id)
            })
            .map(|miniblock| miniblock.hash.clone())
            .collect()
    }

    /// Index unseen miniblocks, update the ones already stored by the other shard
    pub fn serialize_bulk_miniblocks(
        &self,
        miniblocks: &[Miniblock],
        existing: &HashSet<String>,
        buffer: &mut BufferSlice,
        index: &str,
        shard_id: u32,
    ) -> IndexerResult<()> {
        for miniblock in miniblocks {
            let doc = serde_json::to_vec(miniblock)?;
            if !existing.contains(&miniblock.hash) {
                buffer.put_data(&index_meta(index, &miniblock.hash), &doc);
                continue;
            }

            let on_source_not_processed = shard_id == miniblock.sender_shard
                && miniblock.proc_type_d != ProcessingType::Processed.to_string();
            let script = format!(
                "{{\"scripted_upsert\": true, \"script\": {{\"source\": \"{}\",\"lang\": \"painless\",\"params\": {{ \"mb\": {}, \"osnp\": {} }}}},\"upsert\": {{}}}}",
                format_painless_source(UPDATE_MINIBLOCK_SCRIPT),
                String::from_utf8_lossy(&doc),
                on_source_not_processed
            );
            buffer.put_data(&update_meta(index, &miniblock.hash), script.as_bytes());
        }

        Ok(())
    }
}

fn processing_type(position: usize, header: &Header) -> ProcessingType {
    header
        .miniblock_headers
        .get(position)
        .map(|miniblock_header| miniblock_header.processing_type)
        .unwrap_or_default()
}

fn prepare_miniblock(position: usize, miniblock: &MiniBlock, header: &Header, header_hash: &str) -> Miniblock {
    let mut document = Miniblock {
        hash: miniblock.hash.clone(),
        sender_shard: miniblock.sender_shard_id,
        receiver_shard: miniblock.receiver_shard_id,
        kind: miniblock.kind.to_string(),
        timestamp: header.timestamp,
        ..Default::default()
    };

    let processing_type = processing_type(position, header);
    let is_intra_shard = document.sender_shard == document.receiver_shard;
    let is_cross_on_source = !is_intra_shard && document.sender_shard == header.shard_id;
    if !is_intra_shard && !is_cross_on_source {
        document.receiver_block_hash = header_hash.to_string();
        document.proc_type_d = processing_type.to_string();
        return document;
    }

    document.proc_type_s = processing_type.to_string();
    match processing_type {
        ProcessingType::Normal => {
            document.sender_block_hash = header_hash.to_string();
            if is_intra_shard {
                document.receiver_block_hash = header_hash.to_string();
                document.proc_type_d = processing_type.to_string();
            }
        }
        ProcessingType::Scheduled => {
            document.sender_block_hash = header_hash.to_string();
        }
        ProcessingType::Processed => {
            document.receiver_block_hash = header_hash.to_string();
            document.proc_type_d = processing_type.to_string();
        }
    }

    document
}
