//! Value converters shared by the entity processors

pub mod attributes;
pub mod balance;
pub mod fields;

pub use attributes::{
    extract_metadata_from_attributes, extract_tags_from_attributes, prepare_token_metadata,
};
pub use balance::BalanceConverter;
pub use fields::{
    compute_token_identifier, encode_nonce_to_hex, format_painless_source, json_escape,
};
