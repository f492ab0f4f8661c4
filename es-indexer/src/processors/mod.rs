//! Entity processors
//!
//! Each processor turns one kind of upstream object into documents and writes
//! them, together with their bulk action line, into a [`BufferSlice`].
//!
//! [`BufferSlice`]: crate::data::BufferSlice

pub mod accounts;
pub mod block;
pub mod logsevents;
pub mod miniblocks;
pub mod statistics;
pub mod tags;
pub mod tokens;
pub mod transactions;
pub mod validators;

pub use accounts::AccountsProcessor;
pub use block::BlockProcessor;
pub use logsevents::{LogsAndEventsProcessor, LogsAndEventsResult};
pub use miniblocks::MiniblocksProcessor;
pub use statistics::StatisticsProcessor;
pub use tags::TagCounter;
pub use tokens::TokensProcessor;
pub use transactions::{PreparedResults, TransactionsProcessor};
pub use validators::ValidatorsProcessor;

use crate::converters::json_escape;

/// `index` action line: create or replace the whole document
pub(crate) fn index_meta(index: &str, id: &str) -> Vec<u8> {
    format!(
        "{{ \"index\" : {{ \"_index\":\"{}\", \"_id\" : \"{}\" }} }}\n",
        index,
        json_escape(id)
    )
    .into_bytes()
}

/// `update` action line, followed by a script or partial document
pub(crate) fn update_meta(index: &str, id: &str) -> Vec<u8> {
    format!(
        "{{ \"update\" : {{\"_index\":\"{}\", \"_id\" : \"{}\" }} }}\n",
        index,
        json_escape(id)
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_lines() {
        assert_eq!(
            index_meta("blocks", "h1"),
            b"{ \"index\" : { \"_index\":\"blocks\", \"_id\" : \"h1\" } }\n".to_vec()
        );
        assert_eq!(
            update_meta("tokens", "a\"b"),
            b"{ \"update\" : {\"_index\":\"tokens\", \"_id\" : \"a\\\"b\" } }\n".to_vec()
        );
    }
}
