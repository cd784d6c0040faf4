use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use quill_ticket::{AccountDirectory, GrantScope};
use quill_types::{AccountId, AccountState, ActorId, AssetId, ModuleId, Selector};

use crate::unit::{UndoOp, UnitOfWork};

/// A permission grant is keyed by who may call what, on which account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantKey {
    pub account: AccountId,
    pub grantee: ActorId,
    pub module: ModuleId,
    pub selector: Selector,
}

/// A registered account: the identity fronting one asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub owner: ActorId,
    pub delegates: Vec<ActorId>,
    pub state: AccountState,
}

/// Access-control errors.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("account {0} already registered")]
    AccountExists(AccountId),

    #[error("account {0} is not registered")]
    UnknownAccount(AccountId),

    #[error("{caller} does not own account {account}")]
    NotOwner { caller: ActorId, account: AccountId },

    #[error("access controller lock poisoned")]
    Lock,
}

#[derive(Default)]
struct AccessState {
    accounts: HashMap<AccountId, AccountRecord>,
    grants: HashMap<GrantKey, GrantScope>,
}

/// The account directory and permission-grant store.
///
/// The controller holds no orchestration state of its own: accounts own their
/// grants, and anything mutated inside a [`UnitOfWork`] can be rolled back
/// until the unit commits.
pub struct AccessController {
    inner: RwLock<AccessState>,
}

impl AccessController {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AccessState::default()),
        }
    }

    /// Create the account fronting `asset`, owned by `owner`, at genesis state.
    pub fn register_account(
        &self,
        unit: &mut UnitOfWork,
        asset: &AssetId,
        owner: ActorId,
    ) -> Result<AccountId, AccessError> {
        let account = AccountId::for_asset(asset);
        let mut state = self.inner.write().map_err(|_| AccessError::Lock)?;

        if state.accounts.contains_key(&account) {
            return Err(AccessError::AccountExists(account));
        }

        state.accounts.insert(
            account.clone(),
            AccountRecord {
                id: account.clone(),
                owner: owner.clone(),
                delegates: Vec::new(),
                state: AccountState::genesis(),
            },
        );
        unit.record(UndoOp::RemoveAccount(account.clone()));

        debug!(account = %account.short_id(), owner = %owner.short_id(), "account registered");
        Ok(account)
    }

    /// Hand ownership to `new_owner`. Only the current owner may transfer.
    pub fn transfer_owner(
        &self,
        unit: &mut UnitOfWork,
        account: &AccountId,
        caller: &ActorId,
        new_owner: ActorId,
    ) -> Result<(), AccessError> {
        let mut state = self.inner.write().map_err(|_| AccessError::Lock)?;
        let record = state
            .accounts
            .get_mut(account)
            .ok_or_else(|| AccessError::UnknownAccount(account.clone()))?;

        if record.owner != *caller {
            return Err(AccessError::NotOwner {
                caller: caller.clone(),
                account: account.clone(),
            });
        }

        let prior = std::mem::replace(&mut record.owner, new_owner);
        unit.record(UndoOp::RestoreOwner {
            account: account.clone(),
            owner: prior,
        });
        Ok(())
    }

    /// Authorize `delegate` to sign tickets for `account`. Owner only.
    pub fn add_delegate(
        &self,
        unit: &mut UnitOfWork,
        account: &AccountId,
        caller: &ActorId,
        delegate: ActorId,
    ) -> Result<(), AccessError> {
        let mut state = self.inner.write().map_err(|_| AccessError::Lock)?;
        let record = state
            .accounts
            .get_mut(account)
            .ok_or_else(|| AccessError::UnknownAccount(account.clone()))?;

        if record.owner != *caller {
            return Err(AccessError::NotOwner {
                caller: caller.clone(),
                account: account.clone(),
            });
        }

        if !record.delegates.contains(&delegate) {
            record.delegates.push(delegate.clone());
            unit.record(UndoOp::RemoveDelegate {
                account: account.clone(),
                delegate,
            });
        }
        Ok(())
    }

    /// Direct permission management on the owner path: install or remove a
    /// persistent grant without a ticket. Only the account owner may call.
    pub fn set_permission(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        account: &AccountId,
        grantee: ActorId,
        module: ModuleId,
        selector: Selector,
        allow: bool,
    ) -> Result<(), AccessError> {
        let mut state = self.inner.write().map_err(|_| AccessError::Lock)?;
        let record = state
            .accounts
            .get(account)
            .ok_or_else(|| AccessError::UnknownAccount(account.clone()))?;

        if record.owner != *caller {
            return Err(AccessError::NotOwner {
                caller: caller.clone(),
                account: account.clone(),
            });
        }

        let key = GrantKey {
            account: account.clone(),
            grantee,
            module,
            selector,
        };

        if allow {
            match state.grants.insert(key.clone(), GrantScope::Persistent) {
                Some(prior) => unit.record(UndoOp::RestoreGrant(key, prior)),
                None => unit.record(UndoOp::RemoveGrant(key)),
            }
        } else if let Some(prior) = state.grants.remove(&key) {
            unit.record(UndoOp::RestoreGrant(key, prior));
        }
        Ok(())
    }

    /// Install a grant from a verified ticket. Transient grants are recorded
    /// in the unit so they can be cleared at commit.
    pub(crate) fn install_grant(
        &self,
        unit: &mut UnitOfWork,
        key: GrantKey,
        scope: GrantScope,
    ) -> Result<(), AccessError> {
        let mut state = self.inner.write().map_err(|_| AccessError::Lock)?;
        let prior = state.grants.insert(key.clone(), scope);

        match prior {
            Some(prior_scope) => unit.record(UndoOp::RestoreGrant(key.clone(), prior_scope)),
            None => unit.record(UndoOp::RemoveGrant(key.clone())),
        }
        if scope == GrantScope::Transient {
            unit.record_transient(key, prior);
        }
        Ok(())
    }

    /// Advance an account's optimistic-lock state to a ticket's post-state.
    pub(crate) fn advance_state(
        &self,
        unit: &mut UnitOfWork,
        account: &AccountId,
        post_state: AccountState,
    ) -> Result<(), AccessError> {
        let mut state = self.inner.write().map_err(|_| AccessError::Lock)?;
        let record = state
            .accounts
            .get_mut(account)
            .ok_or_else(|| AccessError::UnknownAccount(account.clone()))?;

        let prior = std::mem::replace(&mut record.state, post_state);
        unit.record(UndoOp::RestoreState {
            account: account.clone(),
            state: prior,
        });
        Ok(())
    }

    /// Is `actor` allowed to invoke `(module, selector)` on `account`?
    /// The owner is always allowed; anyone else needs an installed grant.
    pub fn is_allowed(
        &self,
        account: &AccountId,
        actor: &ActorId,
        module: &ModuleId,
        selector: &Selector,
    ) -> bool {
        let state = match self.inner.read() {
            Ok(state) => state,
            Err(_) => return false,
        };

        match state.accounts.get(account) {
            Some(record) if record.owner == *actor => true,
            Some(_) => state.grants.contains_key(&GrantKey {
                account: account.clone(),
                grantee: actor.clone(),
                module: module.clone(),
                selector: selector.clone(),
            }),
            None => false,
        }
    }

    pub fn record_of(&self, account: &AccountId) -> Result<AccountRecord, AccessError> {
        let state = self.inner.read().map_err(|_| AccessError::Lock)?;
        state
            .accounts
            .get(account)
            .cloned()
            .ok_or_else(|| AccessError::UnknownAccount(account.clone()))
    }

    /// Snapshot of the full grant set, for inspection and tests.
    pub fn grants_snapshot(&self) -> HashMap<GrantKey, GrantScope> {
        self.inner
            .read()
            .map(|state| state.grants.clone())
            .unwrap_or_default()
    }

    /// Commit a unit of work: every transient grant installed during the unit
    /// is cleared, restoring any persistent grant the key held before the
    /// unit. Processed newest-first so repeated installs of the same key
    /// resolve to the true pre-unit value.
    pub fn commit(&self, unit: UnitOfWork) -> Result<(), AccessError> {
        let mut state = self.inner.write().map_err(|_| AccessError::Lock)?;
        for (key, prior) in unit.transient.into_iter().rev() {
            if state.grants.get(&key) != Some(&GrantScope::Transient) {
                continue;
            }
            match prior {
                Some(GrantScope::Persistent) => {
                    state.grants.insert(key, GrantScope::Persistent);
                }
                _ => {
                    state.grants.remove(&key);
                }
            }
        }
        Ok(())
    }

    /// Abort a unit of work: replay the undo journal in reverse, restoring
    /// the exact pre-unit accounts and grant set.
    pub fn abort(&self, unit: UnitOfWork) -> Result<(), AccessError> {
        let mut state = self.inner.write().map_err(|_| AccessError::Lock)?;
        for op in unit.journal.into_iter().rev() {
            match op {
                UndoOp::RemoveAccount(account) => {
                    state.accounts.remove(&account);
                }
                UndoOp::RestoreState { account, state: prior } => {
                    if let Some(record) = state.accounts.get_mut(&account) {
                        record.state = prior;
                    }
                }
                UndoOp::RestoreOwner { account, owner } => {
                    if let Some(record) = state.accounts.get_mut(&account) {
                        record.owner = owner;
                    }
                }
                UndoOp::RemoveDelegate { account, delegate } => {
                    if let Some(record) = state.accounts.get_mut(&account) {
                        record.delegates.retain(|d| *d != delegate);
                    }
                }
                UndoOp::RemoveGrant(key) => {
                    state.grants.remove(&key);
                }
                UndoOp::RestoreGrant(key, scope) => {
                    state.grants.insert(key, scope);
                }
            }
        }
        Ok(())
    }
}

impl Default for AccessController {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountDirectory for AccessController {
    fn owner_of(&self, account: &AccountId) -> Option<ActorId> {
        let state = self.inner.read().ok()?;
        state.accounts.get(account).map(|r| r.owner.clone())
    }

    fn is_delegate(&self, account: &AccountId, actor: &ActorId) -> bool {
        match self.inner.read() {
            Ok(state) => state
                .accounts
                .get(account)
                .map(|r| r.delegates.contains(actor))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn state_of(&self, account: &AccountId) -> Option<AccountState> {
        let state = self.inner.read().ok()?;
        state.accounts.get(account).map(|r| r.state)
    }
}
