//! Data containers shared by the processors and the client

pub mod altered;
pub mod buffer;
pub mod documents;
pub mod indices;

pub use altered::AlteredAccounts;
pub use buffer::{BufferSlice, DEFAULT_BULK_SIZE_THRESHOLD};
