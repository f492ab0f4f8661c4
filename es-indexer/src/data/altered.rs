//! Per block aggregation of altered accounts
//!
//! Every operation that touches an account produces an [`AlteredAccount`].
//! [`AlteredAccounts`] folds them per address so that each balance change is
//! indexed once:
//!
//! * plain balance touches collapse into the first entry of the address;
//! * token touches are unique by `(token_identifier, nonce)`;
//! * the first token touch upgrades the plain entry in place;
//! * at most one entry of an address is flagged as sender.

use std::collections::HashMap;

use crate::core::types::AlteredAccount;

/// Altered accounts of one block, keyed by address
#[derive(Debug, Clone, Default)]
pub struct AlteredAccounts {
    accounts: HashMap<String, Vec<AlteredAccount>>,
}

impl AlteredAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `account` into the entries already stored for `address`
    pub fn add(&mut self, address: &str, account: AlteredAccount) {
        let entries = match self.accounts.get_mut(address) {
            Some(entries) if !entries.is_empty() => entries,
            _ => {
                self.accounts.insert(address.to_string(), vec![account]);
                return;
            }
        };

        if !account.is_token_operation() {
            merge_sender(entries, 0, account.is_sender);
            return;
        }

        let same_token = entries.iter().position(|entry| {
            entry.is_token_operation()
                && entry.token_identifier == account.token_identifier
                && entry.nonce == account.nonce
        });
        if let Some(position) = same_token {
            merge_sender(entries, position, account.is_sender);
            entries[position].is_nft_create |= account.is_nft_create;
            return;
        }

        // the regular slot is upgraded by the first token delta only
        if let Some(position) = entries.iter().position(|entry| !entry.is_token_operation()) {
            let is_sender = entries[position].is_sender || account.is_sender;
            entries[position] = AlteredAccount {
                is_sender,
                ..account
            };
            return;
        }

        let mut account = account;
        if entries.iter().any(|entry| entry.is_sender) {
            account.is_sender = false;
        }
        entries.push(account);
    }

    pub fn get(&self, address: &str) -> Option<&[AlteredAccount]> {
        self.accounts.get(address).map(Vec::as_slice)
    }

    /// Number of distinct addresses
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get_all(&self) -> &HashMap<String, Vec<AlteredAccount>> {
        &self.accounts
    }
}

/// OR `is_sender` into one entry unless another entry of the address already carries it
fn merge_sender(entries: &mut [AlteredAccount], position: usize, is_sender: bool) {
    let attributed_elsewhere = entries
        .iter()
        .enumerate()
        .any(|(index, entry)| index != position && entry.is_sender);

    entries[position].is_sender |= is_sender && !attributed_elsewhere;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn token(identifier: &str, nonce: &str, is_sender: bool) -> AlteredAccount {
        AlteredAccount {
            address: "addr".to_string(),
            is_sender,
            is_esdt_operation: true,
            token_identifier: identifier.to_string(),
            nonce: nonce.to_string(),
            ..Default::default()
        }
    }

    fn regular(is_sender: bool) -> AlteredAccount {
        AlteredAccount {
            address: "addr".to_string(),
            is_sender,
            ..Default::default()
        }
    }

    #[test]
    fn test_get_all_on_empty_aggregator() {
        let altered = AlteredAccounts::default();
        assert!(altered.get_all().is_empty());
        assert_eq!(altered.len(), 0);
        assert!(altered.get("addr").is_none());
    }

    #[test]
    fn test_regular_touches_merge_sender() {
        let mut altered = AlteredAccounts::new();
        altered.add("addr", regular(false));
        altered.add("addr", regular(true));

        let entries = altered.get("addr").unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_sender);
    }

    #[test]
    fn test_same_token_merges_sender() {
        let mut altered = AlteredAccounts::new();
        altered.add("addr", token("X", "0", false));
        altered.add("addr", token("X", "0", true));

        let entries = altered.get("addr").unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_sender);
        assert_eq!(entries[0].token_identifier, "X");
    }

    #[test]
    fn test_regular_slot_upgraded_exactly_once() {
        let mut altered = AlteredAccounts::new();
        altered.add("addr", regular(true));
        altered.add("addr", token("X", "1", false));

        let entries = altered.get("addr").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].token_identifier, "X");
        assert_eq!(entries[0].nonce, "1");
        assert!(entries[0].is_esdt_operation);
        assert!(entries[0].is_sender);

        // the slot now holds a token, a second token is appended
        altered.add("addr", token("Y", "0", true));
        let entries = altered.get("addr").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].token_identifier, "Y");
        assert!(!entries[1].is_sender);
    }

    #[test]
    fn test_regular_after_tokens_does_not_add_entry() {
        let mut altered = AlteredAccounts::new();
        altered.add("addr", token("X", "0", false));
        altered.add("addr", regular(true));

        let entries = altered.get("addr").unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_sender);
        assert_eq!(entries[0].token_identifier, "X");
    }

    #[test]
    fn test_sender_touch_keeps_attribution_on_sending_token() {
        let mut altered = AlteredAccounts::new();
        altered.add("addr", token("X", "0", false));
        altered.add("addr", token("Y", "0", true));
        altered.add("addr", regular(true));

        let entries = altered.get("addr").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].is_sender);
        assert!(entries[1].is_sender);
        assert_eq!(entries[1].token_identifier, "Y");
    }

    #[test]
    fn test_addresses_are_independent() {
        let mut altered = AlteredAccounts::new();
        altered.add("a", token("X", "0", true));
        altered.add("b", token("X", "0", true));

        assert_eq!(altered.len(), 2);
        assert!(altered.get("a").unwrap()[0].is_sender);
        assert!(altered.get("b").unwrap()[0].is_sender);
    }

    fn arb_account() -> impl Strategy<Value = AlteredAccount> {
        (any::<bool>(), any::<bool>(), 0usize..3, 0u8..3).prop_map(
            |(is_sender, is_token, token_index, nonce)| {
                if is_token {
                    token(["X", "Y", "Z"][token_index], &nonce.to_string(), is_sender)
                } else {
                    regular(is_sender)
                }
            },
        )
    }

    proptest! {
        #[test]
        fn prop_adding_twice_is_idempotent(accounts in prop::collection::vec(arb_account(), 1..12)) {
            let mut once = AlteredAccounts::new();
            let mut twice = AlteredAccounts::new();
            for account in &accounts {
                once.add("addr", account.clone());
                twice.add("addr", account.clone());
                twice.add("addr", account.clone());
            }

            prop_assert_eq!(once.get("addr"), twice.get("addr"));
        }

        #[test]
        fn prop_single_sender_per_address(accounts in prop::collection::vec(arb_account(), 1..16)) {
            let mut altered = AlteredAccounts::new();
            for account in accounts {
                altered.add("addr", account);
            }

            let senders = altered
                .get("addr")
                .map(|entries| entries.iter().filter(|entry| entry.is_sender).count())
                .unwrap_or_default();
            prop_assert!(senders <= 1);
        }
    }
}
