//! Names of the indices managed by the indexer

pub const BLOCK_INDEX: &str = "blocks";
pub const MINIBLOCKS_INDEX: &str = "miniblocks";
pub const TRANSACTIONS_INDEX: &str = "transactions";
pub const VALIDATORS_INDEX: &str = "validators";
pub const ROUNDS_INDEX: &str = "rounds";
pub const RATING_INDEX: &str = "rating";
pub const ACCOUNTS_INDEX: &str = "accounts";
pub const ACCOUNTS_HISTORY_INDEX: &str = "accountshistory";
pub const RECEIPTS_INDEX: &str = "receipts";
pub const SC_RESULTS_INDEX: &str = "scresults";
pub const ACCOUNTS_ESDT_INDEX: &str = "accountsesdt";
pub const ACCOUNTS_ESDT_HISTORY_INDEX: &str = "accountsesdthistory";
pub const EPOCH_INFO_INDEX: &str = "epochinfo";
pub const TOKENS_INDEX: &str = "tokens";
pub const TAGS_INDEX: &str = "tags";
pub const LOGS_INDEX: &str = "logs";
pub const OPERATIONS_INDEX: &str = "operations";
pub const EVENTS_INDEX: &str = "events";

/// Name of the index lifecycle policy installed before the templates
pub const OPEN_DISTRO_INDEX: &str = "opendistro";

/// Suffix of the first backing index of every alias
pub const INDEX_SUFFIX: &str = "-000001";

/// Every index the indexer knows how to fill
pub const ALL_INDICES: &[&str] = &[
    BLOCK_INDEX,
    MINIBLOCKS_INDEX,
    TRANSACTIONS_INDEX,
    VALIDATORS_INDEX,
    ROUNDS_INDEX,
    RATING_INDEX,
    ACCOUNTS_INDEX,
    ACCOUNTS_HISTORY_INDEX,
    RECEIPTS_INDEX,
    SC_RESULTS_INDEX,
    ACCOUNTS_ESDT_INDEX,
    ACCOUNTS_ESDT_HISTORY_INDEX,
    EPOCH_INFO_INDEX,
    TOKENS_INDEX,
    TAGS_INDEX,
    LOGS_INDEX,
    OPERATIONS_INDEX,
    EVENTS_INDEX,
];

/// Name of the first backing index of `alias`
pub fn backing_index(alias: &str) -> String {
    format!("{}{}", alias, INDEX_SUFFIX)
}

pub fn is_known_index(index: &str) -> bool {
    ALL_INDICES.contains(&index)
}
