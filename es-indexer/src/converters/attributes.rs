//! Parsing of NFT attributes and token metadata
//!
//! Attributes are free text of the form `key:v1,v2;key2:v3`. The `tags` key
//! holds searchable tags, the `metadata` key points to off-chain metadata.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::fields::{
    truncate_field_if_exceeds_max_length, truncate_field_if_exceeds_max_length_base64,
    truncate_slice_elements_if_exceeds_max_length,
};
use crate::core::types::EsdtMetaData;
use crate::data::documents::TokenMetaData;

const ATTRIBUTES_SEPARATOR: char = ';';
const KEY_VALUES_SEPARATOR: char = ':';
const VALUES_SEPARATOR: char = ',';
const TAGS_KEY: &str = "tags";
const METADATA_KEY: &str = "metadata";

const IPFS_URL: &str = "https://ipfs.io/ipfs/";
const IPFS_NO_SECURE_PREFIX: &str = "ipfs://";
const DWEB_PREFIX_URL: &str = "https://dweb.link/ipfs";
const PINATA_CLOUD: &str = ".pinata.cloud/ipfs";
const SECURE_URL: &str = "https://";

/// Lower cased, non empty tags found in `attributes`
pub fn extract_tags_from_attributes(attributes: &str) -> Vec<String> {
    extract_from_attributes(attributes, TAGS_KEY)
}

/// First `metadata` value found in `attributes`, or an empty string
pub fn extract_metadata_from_attributes(attributes: &str) -> String {
    extract_from_attributes(attributes, METADATA_KEY)
        .first()
        .map(|value| truncate_field_if_exceeds_max_length(value).to_string())
        .unwrap_or_default()
}

fn extract_from_attributes(attributes: &str, key: &str) -> Vec<String> {
    for pair in attributes.split(ATTRIBUTES_SEPARATOR) {
        let mut parts = pair.split(KEY_VALUES_SEPARATOR);
        let (Some(pair_key), Some(values)) = (parts.next(), parts.next()) else {
            continue;
        };
        if pair_key != key {
            continue;
        }

        return values
            .split(VALUES_SEPARATOR)
            .filter(|value| !value.is_empty())
            .map(|value| {
                if key == TAGS_KEY {
                    value.to_lowercase()
                } else {
                    value.to_string()
                }
            })
            .collect();
    }

    Vec::new()
}

fn non_empty_uris(uris: &[String]) -> bool {
    uris.iter().any(|uri| !uri.is_empty())
}

/// The first URI points to a known content addressed storage
fn white_listed_storage(uris: &[String]) -> bool {
    let Some(uri) = uris.first() else {
        return false;
    };

    uri.starts_with(IPFS_URL)
        || uri.starts_with(IPFS_NO_SECURE_PREFIX)
        || uri.starts_with(DWEB_PREFIX_URL)
        || (uri.contains(PINATA_CLOUD) && uri.starts_with(SECURE_URL))
}

/// Convert on-chain metadata into its stored form; binary fields are base64 encoded
pub fn prepare_token_metadata(metadata: Option<&EsdtMetaData>) -> Option<TokenMetaData> {
    let metadata = metadata?;

    Some(TokenMetaData {
        name: metadata.name.clone(),
        creator: metadata.creator.clone(),
        royalties: metadata.royalties,
        hash: STANDARD.encode(truncate_field_if_exceeds_max_length_base64(&metadata.hash)),
        uris: metadata
            .uris
            .iter()
            .map(|uri| STANDARD.encode(truncate_field_if_exceeds_max_length_base64(uri)))
            .collect(),
        tags: truncate_slice_elements_if_exceeds_max_length(&extract_tags_from_attributes(&metadata.attributes)),
        attributes: STANDARD.encode(truncate_field_if_exceeds_max_length_base64(&metadata.attributes)),
        metadata: extract_metadata_from_attributes(&metadata.attributes),
        non_empty_uris: non_empty_uris(&metadata.uris),
        white_listed_storage: white_listed_storage(&metadata.uris),
    })
}
