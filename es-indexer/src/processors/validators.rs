//! Validator public keys and ratings

use super::index_meta;
use crate::core::error::IndexerResult;
use crate::core::types::{ValidatorsPubKeys, ValidatorsRating};
use crate::data::documents::{ValidatorRatingInfo, ValidatorsPublicKeys};
use crate::data::BufferSlice;

#[derive(Debug, Default, Clone)]
pub struct ValidatorsProcessor;

impl ValidatorsProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Public keys of one shard for an epoch, keyed `shard_epoch`
    pub fn serialize_validators_pub_keys(
        &self,
        validators: &ValidatorsPubKeys,
        buffer: &mut BufferSlice,
        index: &str,
    ) -> IndexerResult<()> {
        let doc = serde_json::to_vec(&ValidatorsPublicKeys {
            public_keys: validators.public_keys.clone(),
        })?;
        let id = format!("{}_{}", validators.shard_id, validators.epoch);
        buffer.put_data(&index_meta(index, &id), &doc);
        Ok(())
    }

    pub fn prepare_validators_rating(&self, rating: &ValidatorsRating) -> Vec<ValidatorRatingInfo> {
        rating
            .ratings
            .iter()
            .map(|info| ValidatorRatingInfo {
                id: format!("{}_{}", info.public_key, rating.epoch),
                rating: info.rating,
            })
            .collect()
    }

    pub fn serialize_validators_rating(
        &self,
        ratings: &[ValidatorRatingInfo],
        buffer: &mut BufferSlice,
        index: &str,
    ) -> IndexerResult<()> {
        for rating in ratings {
            let doc = serde_json::to_vec(rating)?;
            buffer.put_data(&index_meta(index, &rating.id), &doc);
        }
        Ok(())
    }
}
