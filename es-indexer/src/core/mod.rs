//! Core domain abstractions and types
//!
//! This module contains the foundational types, traits, and error definitions
//! that form the core of the indexer's domain model. It's designed to be
//! independent of any specific infrastructure concerns.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{ConversionError, ElasticError, IndexerError, IndexerResult, ProcessorError};
pub use traits::{AccountsAdapter, DatabaseClient, ScrollHandler, TemplatesAndPoliciesReader};
pub use types::{
    AlteredAccount, Body, Header, MiniBlock, MiniBlockType, OutportBlock, ProcessingType,
    TransactionPool, UserAccount, METACHAIN_SHARD_ID,
};
