//! Account state held in memory
//!
//! Block files carry the state of every altered account after the block.
//! [`InMemoryAccounts`] serves that state to the accounts processor and is
//! replaced before each block is indexed.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::core::error::{IndexerError, IndexerResult};
use crate::core::traits::AccountsAdapter;
use crate::core::types::{EsdtToken, UserAccount};

#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    accounts: RwLock<HashMap<String, UserAccount>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the previous state and keep `accounts`
    pub fn replace(&self, accounts: &[UserAccount]) -> IndexerResult<()> {
        let mut state = self
            .accounts
            .write()
            .map_err(|_| anyhow::anyhow!("accounts state lock poisoned"))?;

        state.clear();
        for account in accounts {
            state.insert(account.address.clone(), account.clone());
        }
        debug!(target: "es_indexer::adapters::accounts", "loaded {} accounts", state.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accounts.read().map(|state| state.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccountsAdapter for InMemoryAccounts {
    fn load_account(&self, address: &str) -> IndexerResult<UserAccount> {
        let state = self
            .accounts
            .read()
            .map_err(|_| anyhow::anyhow!("accounts state lock poisoned"))?;

        state.get(address).cloned().ok_or_else(|| IndexerError::AccountNotFound {
            address: address.to_string(),
        })
    }

    fn esdt_token(&self, address: &str, token: &str, nonce: u64) -> IndexerResult<Option<EsdtToken>> {
        let account = self.load_account(address)?;
        Ok(account
            .esdt
            .into_iter()
            .find(|esdt| esdt.token == token && esdt.nonce == nonce))
    }
}
