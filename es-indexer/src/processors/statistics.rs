//! Round statistics

use super::index_meta;
use crate::core::error::IndexerResult;
use crate::core::types::RoundInfo;
use crate::data::documents;
use crate::data::BufferSlice;

#[derive(Debug, Default, Clone)]
pub struct StatisticsProcessor;

impl StatisticsProcessor {
    pub fn new() -> Self {
        Self
    }

    /// One document per round, keyed `shard_round`
    pub fn serialize_rounds_info(&self, rounds: &[RoundInfo], buffer: &mut BufferSlice, index: &str) -> IndexerResult<()> {
        for info in rounds {
            let doc = serde_json::to_vec(&documents::RoundInfo {
                round: info.round,
                signers_indexes: info.signers_indexes.clone(),
                block_was_proposed: info.block_was_proposed,
                shard_id: info.shard_id,
                epoch: info.epoch,
                timestamp: info.timestamp,
            })?;
            let id = format!("{}_{}", info.shard_id, info.round);
            buffer.put_data(&index_meta(index, &id), &doc);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_rounds() {
        let rounds = vec![
            RoundInfo {
                round: 10,
                signers_indexes: vec![0, 1],
                block_was_proposed: true,
                shard_id: 1,
                epoch: 2,
                timestamp: 60,
            },
            RoundInfo {
                round: 11,
                shard_id: 1,
                ..Default::default()
            },
        ];

        let mut buffer = BufferSlice::default();
        StatisticsProcessor::new()
            .serialize_rounds_info(&rounds, &mut buffer, "rounds")
            .unwrap();

        let body = String::from_utf8(buffer.buffers()[0].clone()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "{ \"index\" : { \"_index\":\"rounds\", \"_id\" : \"1_10\" } }");
        assert_eq!(
            lines[1],
            "{\"round\":10,\"signersIndexes\":[0,1],\"blockWasProposed\":true,\"shardId\":1,\"epoch\":2,\"timestamp\":60}"
        );
        assert_eq!(lines[2], "{ \"index\" : { \"_index\":\"rounds\", \"_id\" : \"1_11\" } }");
    }
}
