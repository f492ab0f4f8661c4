//! Elasticsearch / OpenSearch indexer for blockchain block data
//!
//! Block commit events are turned into documents by the entity processors,
//! packed into size bounded bulk buffers and written through a synchronous
//! search cluster client.

pub mod adapters;
pub mod client;
pub mod config;
pub mod converters;
pub mod core;
pub mod data;
pub mod metrics;
pub mod orchestrator;
pub mod processors;
pub mod templates;

// Re-export commonly used types
pub use adapters::InMemoryAccounts;
pub use client::ElasticClient;
pub use config::IndexerConfig;
pub use crate::core::{IndexerError, IndexerResult};
pub use metrics::StatusMetrics;
pub use orchestrator::{ArgsElasticProcessor, ElasticProcessor};
