use quill_ticket::GrantScope;
use quill_types::{AccountId, AccountState, ActorId};

use crate::controller::GrantKey;

/// One reversible mutation applied inside a unit of work.
#[derive(Clone, Debug)]
pub(crate) enum UndoOp {
    RemoveAccount(AccountId),
    RestoreState {
        account: AccountId,
        state: AccountState,
    },
    RestoreOwner {
        account: AccountId,
        owner: ActorId,
    },
    RemoveDelegate {
        account: AccountId,
        delegate: ActorId,
    },
    RemoveGrant(GrantKey),
    RestoreGrant(GrantKey, GrantScope),
}

/// The transaction analog: a journal of mutations applied through the access
/// controller, plus the transient grants installed along the way.
///
/// `AccessController::abort` replays the journal in reverse, restoring the
/// exact pre-unit grant set and account states. `AccessController::commit`
/// clears every transient grant recorded here — transient authority is scoped
/// to the unit structurally, not by convention.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    pub(crate) journal: Vec<UndoOp>,
    /// Transient grants installed in this unit, with the value each key held
    /// before installation (restored at commit).
    pub(crate) transient: Vec<(GrantKey, Option<GrantScope>)>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of journaled mutations. Zero means the unit observed only.
    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    /// Fold a completed sub-unit into this one, preserving order.
    pub fn merge(&mut self, other: UnitOfWork) {
        self.journal.extend(other.journal);
        self.transient.extend(other.transient);
    }

    pub(crate) fn record(&mut self, op: UndoOp) {
        self.journal.push(op);
    }

    pub(crate) fn record_transient(&mut self, key: GrantKey, prior: Option<GrantScope>) {
        self.transient.push((key, prior));
    }
}
