//! In-memory account directory for testing the verifier in isolation.

use std::collections::HashMap;
use std::sync::RwLock;

use quill_types::{AccountId, AccountState, ActorId};

use crate::verifier::AccountDirectory;

struct MockRecord {
    owner: ActorId,
    delegates: Vec<ActorId>,
    state: AccountState,
}

/// Mock [`AccountDirectory`] backed by a hash map.
pub struct MockAccountDirectory {
    accounts: RwLock<HashMap<AccountId, MockRecord>>,
}

impl MockAccountDirectory {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, account: AccountId, owner: ActorId, state: AccountState) {
        if let Ok(mut accounts) = self.accounts.write() {
            accounts.insert(
                account,
                MockRecord {
                    owner,
                    delegates: Vec::new(),
                    state,
                },
            );
        }
    }

    pub fn add_delegate(&self, account: &AccountId, delegate: ActorId) {
        if let Ok(mut accounts) = self.accounts.write() {
            if let Some(record) = accounts.get_mut(account) {
                record.delegates.push(delegate);
            }
        }
    }

    pub fn set_state(&self, account: &AccountId, state: AccountState) {
        if let Ok(mut accounts) = self.accounts.write() {
            if let Some(record) = accounts.get_mut(account) {
                record.state = state;
            }
        }
    }
}

impl Default for MockAccountDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountDirectory for MockAccountDirectory {
    fn owner_of(&self, account: &AccountId) -> Option<ActorId> {
        let accounts = self.accounts.read().ok()?;
        accounts.get(account).map(|record| record.owner.clone())
    }

    fn is_delegate(&self, account: &AccountId, actor: &ActorId) -> bool {
        match self.accounts.read() {
            Ok(accounts) => accounts
                .get(account)
                .map(|record| record.delegates.contains(actor))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn state_of(&self, account: &AccountId) -> Option<AccountState> {
        let accounts = self.accounts.read().ok()?;
        accounts.get(account).map(|record| record.state)
    }
}
