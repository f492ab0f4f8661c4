//! Centralized error types for the indexer

use std::time::Duration;
use thiserror::Error;

/// Main indexer error type
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Elastic error: {0}")]
    Elastic(#[from] ElasticError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Account not found: {address}")]
    AccountNotFound { address: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised while talking to the search cluster
#[derive(Error, Debug)]
pub enum ElasticError {
    /// The cluster asked us to slow down (403/429 flavoured answer)
    #[error("back off: the cluster is throttling requests")]
    BackOff,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("request to {path} failed with status {status}: {body}")]
    Status { path: String, status: u16, body: String },

    /// Partial failure of a bulk request; holds a bounded summary of the failed items
    #[error("bulk request returned errors: {}", .0.join(", "))]
    BulkItems(Vec<String>),

    #[error("cannot decode response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Value conversion failures
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConversionError {
    #[error("provided value is too big")]
    ValueTooBig,

    #[error("cannot convert string to big value: {0}")]
    InvalidBigValue(String),

    #[error("negative denomination value")]
    NegativeDenomination,
}

/// Construction and argument errors of the processors and the orchestrator
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("nil or missing {0}")]
    MissingComponent(&'static str),

    #[error("no enabled indices")]
    NoEnabledIndices,

    #[error("unknown index: {0}")]
    UnknownIndex(String),

    #[error("invalid shard coordinate: {0}")]
    InvalidShard(u32),
}

/// Result type alias for indexer operations
pub type IndexerResult<T> = Result<T, IndexerError>;

impl From<serde_json::Error> for IndexerError {
    fn from(err: serde_json::Error) -> Self {
        IndexerError::Serialization(err.to_string())
    }
}

impl From<prometheus::Error> for IndexerError {
    fn from(err: prometheus::Error) -> Self {
        IndexerError::Metrics(err.to_string())
    }
}

impl From<serde_json::Error> for ElasticError {
    fn from(err: serde_json::Error) -> Self {
        ElasticError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ElasticError {
    fn from(err: std::io::Error) -> Self {
        ElasticError::Transport(err.to_string())
    }
}

impl ElasticError {
    /// True for errors the cluster reports as throttling
    pub fn is_back_off(&self) -> bool {
        matches!(self, ElasticError::BackOff)
    }
}
