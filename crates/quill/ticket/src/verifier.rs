use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use quill_crypto::CryptoError;
use quill_types::{AccountId, AccountState, ActorId};

use crate::ticket::{
    expected_post_state, GrantScope, PermissionRequest, PermissionTicket, TicketAuthorization,
};

/// Account lookups the verifier needs. Implemented by the access controller.
pub trait AccountDirectory: Send + Sync {
    fn owner_of(&self, account: &AccountId) -> Option<ActorId>;

    fn is_delegate(&self, account: &AccountId, actor: &ActorId) -> bool;

    fn state_of(&self, account: &AccountId) -> Option<AccountState>;
}

/// Ticket verification failures. One distinct variant per violated condition
/// so callers can present precise diagnostics.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("permission ticket expired at {deadline}")]
    Expired { deadline: DateTime<Utc> },

    #[error("permission ticket covers no requests")]
    EmptyRequests,

    #[error("ticket bound to executor {expected}, presented for {actual}")]
    ExecutorMismatch { expected: ActorId, actual: ActorId },

    #[error("account {0} is not registered")]
    UnknownAccount(AccountId),

    #[error("ticket signature does not verify under the claimed signer")]
    SignatureInvalid(#[source] CryptoError),

    #[error("signer {signer} is neither owner nor delegate of account {account}")]
    SignerNotAuthorized { signer: ActorId, account: AccountId },

    #[error("stale state: ticket expects {expected}, account would reach {derived}")]
    StaleState {
        expected: AccountState,
        derived: AccountState,
    },

    #[error("unsigned ticket for account {account} submitted by non-owner {caller}")]
    UnsignedCallerNotOwner { caller: ActorId, account: AccountId },
}

/// How a verified ticket was authorized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationMode {
    /// A signature from the owner or a delegate authorizes the executor.
    Delegated,
    /// The submitting caller owns the account; no grant will be installed.
    DirectOwner,
}

/// Outcome of successful verification: the verified signer and the state the
/// account is expected to reach once the ticket is consumed.
#[derive(Clone, Debug)]
pub struct VerifiedTicket {
    pub account: AccountId,
    pub executor: ActorId,
    pub signer: ActorId,
    pub requests: Vec<PermissionRequest>,
    pub scope: GrantScope,
    pub post_state: AccountState,
    pub mode: VerificationMode,
}

/// Validates permission tickets against the live account directory.
pub struct TicketVerifier {
    directory: Arc<dyn AccountDirectory>,
}

impl TicketVerifier {
    pub fn new(directory: Arc<dyn AccountDirectory>) -> Self {
        Self { directory }
    }

    /// Verify `ticket`, submitted by `caller` on behalf of `executor`.
    ///
    /// Checks run in a fixed order: deadline, shape, executor binding,
    /// signature, signer authority, state chain. Each failure is distinct.
    pub fn verify(
        &self,
        ticket: &PermissionTicket,
        caller: &ActorId,
        executor: &ActorId,
    ) -> Result<VerifiedTicket, TicketError> {
        let now = Utc::now();
        if now > ticket.deadline {
            return Err(TicketError::Expired {
                deadline: ticket.deadline,
            });
        }

        if ticket.requests.is_empty() {
            return Err(TicketError::EmptyRequests);
        }

        if ticket.executor != *executor {
            return Err(TicketError::ExecutorMismatch {
                expected: ticket.executor.clone(),
                actual: executor.clone(),
            });
        }

        let owner = self
            .directory
            .owner_of(&ticket.account)
            .ok_or_else(|| TicketError::UnknownAccount(ticket.account.clone()))?;
        let current = self
            .directory
            .state_of(&ticket.account)
            .ok_or_else(|| TicketError::UnknownAccount(ticket.account.clone()))?;

        match &ticket.authorization {
            // Explicit branch: no signature means no authorization was
            // requested, which is valid only for the owner acting directly.
            TicketAuthorization::DirectOwner => {
                if *caller != owner {
                    return Err(TicketError::UnsignedCallerNotOwner {
                        caller: caller.clone(),
                        account: ticket.account.clone(),
                    });
                }

                debug!(
                    account = %ticket.account.short_id(),
                    caller = %caller.short_id(),
                    "direct-owner ticket accepted"
                );

                Ok(VerifiedTicket {
                    account: ticket.account.clone(),
                    executor: ticket.executor.clone(),
                    signer: owner,
                    requests: ticket.requests.clone(),
                    scope: ticket.scope,
                    post_state: current,
                    mode: VerificationMode::DirectOwner,
                })
            }
            TicketAuthorization::Signed { signer, signature } => {
                signer
                    .verify(&ticket.signing_digest(), signature)
                    .map_err(TicketError::SignatureInvalid)?;

                let signer_actor = signer.actor_id();
                let authorized = signer_actor == owner
                    || self.directory.is_delegate(&ticket.account, &signer_actor);
                if !authorized {
                    return Err(TicketError::SignerNotAuthorized {
                        signer: signer_actor,
                        account: ticket.account.clone(),
                    });
                }

                let derived = expected_post_state(current, &ticket.requests);
                if derived != ticket.expected_state {
                    return Err(TicketError::StaleState {
                        expected: ticket.expected_state,
                        derived,
                    });
                }

                debug!(
                    account = %ticket.account.short_id(),
                    signer = %signer_actor.short_id(),
                    requests = ticket.requests.len(),
                    post_state = %derived,
                    "signed ticket verified"
                );

                Ok(VerifiedTicket {
                    account: ticket.account.clone(),
                    executor: ticket.executor.clone(),
                    signer: signer_actor,
                    requests: ticket.requests.clone(),
                    scope: ticket.scope,
                    post_state: derived,
                    mode: VerificationMode::Delegated,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockAccountDirectory;
    use crate::ticket::PermissionTicket;
    use chrono::Duration;
    use quill_crypto::Keypair;
    use quill_types::{ModuleId, Selector};

    fn account() -> AccountId {
        AccountId("acct-1".into())
    }

    fn periphery() -> ActorId {
        ActorId::new("periphery")
    }

    fn setup(owner: &Keypair) -> (TicketVerifier, Arc<MockAccountDirectory>) {
        let directory = Arc::new(MockAccountDirectory::new());
        directory.register(account(), owner.actor_id(), AccountState::genesis());
        (TicketVerifier::new(directory.clone()), directory)
    }

    fn signed_ticket(owner: &Keypair, state: AccountState) -> PermissionTicket {
        PermissionTicket::builder(account(), periphery())
            .request(ModuleId::new("licensing"), Selector::new("attach_terms"))
            .signed(owner, state)
    }

    #[test]
    fn valid_ticket_verifies() {
        let owner = Keypair::generate();
        let (verifier, _) = setup(&owner);
        let ticket = signed_ticket(&owner, AccountState::genesis());

        let verified = verifier
            .verify(&ticket, &ActorId::new("anyone"), &periphery())
            .unwrap();
        assert_eq!(verified.mode, VerificationMode::Delegated);
        assert_eq!(verified.signer, owner.actor_id());
        assert_eq!(verified.post_state, ticket.expected_state);
    }

    #[test]
    fn expired_ticket_rejected() {
        let owner = Keypair::generate();
        let (verifier, _) = setup(&owner);
        let ticket = PermissionTicket::builder(account(), periphery())
            .request(ModuleId::new("licensing"), Selector::new("attach_terms"))
            .deadline(Utc::now() - Duration::seconds(1))
            .signed(&owner, AccountState::genesis());

        let result = verifier.verify(&ticket, &ActorId::new("anyone"), &periphery());
        assert!(matches!(result, Err(TicketError::Expired { .. })));
    }

    #[test]
    fn empty_requests_rejected() {
        let owner = Keypair::generate();
        let (verifier, _) = setup(&owner);
        let ticket =
            PermissionTicket::builder(account(), periphery()).signed(&owner, AccountState::genesis());

        let result = verifier.verify(&ticket, &ActorId::new("anyone"), &periphery());
        assert!(matches!(result, Err(TicketError::EmptyRequests)));
    }

    #[test]
    fn executor_mismatch_rejected() {
        let owner = Keypair::generate();
        let (verifier, _) = setup(&owner);
        let ticket = signed_ticket(&owner, AccountState::genesis());

        let result = verifier.verify(&ticket, &ActorId::new("anyone"), &ActorId::new("other"));
        assert!(matches!(result, Err(TicketError::ExecutorMismatch { .. })));
    }

    #[test]
    fn unknown_account_rejected() {
        let owner = Keypair::generate();
        let directory = Arc::new(MockAccountDirectory::new());
        let verifier = TicketVerifier::new(directory);
        let ticket = signed_ticket(&owner, AccountState::genesis());

        let result = verifier.verify(&ticket, &ActorId::new("anyone"), &periphery());
        assert!(matches!(result, Err(TicketError::UnknownAccount(_))));
    }

    #[test]
    fn forged_signature_rejected() {
        let owner = Keypair::generate();
        let intruder = Keypair::generate();
        let (verifier, _) = setup(&owner);

        // Signed by a key that is not the claimed signer's.
        let mut ticket = signed_ticket(&owner, AccountState::genesis());
        if let TicketAuthorization::Signed { signature, .. } = &mut ticket.authorization {
            *signature = intruder.sign(b"unrelated");
        }

        let result = verifier.verify(&ticket, &ActorId::new("anyone"), &periphery());
        assert!(matches!(result, Err(TicketError::SignatureInvalid(_))));
    }

    #[test]
    fn non_owner_signer_rejected() {
        let owner = Keypair::generate();
        let stranger = Keypair::generate();
        let (verifier, _) = setup(&owner);
        let ticket = signed_ticket(&stranger, AccountState::genesis());

        let result = verifier.verify(&ticket, &ActorId::new("anyone"), &periphery());
        assert!(matches!(result, Err(TicketError::SignerNotAuthorized { .. })));
    }

    #[test]
    fn delegate_signer_accepted() {
        let owner = Keypair::generate();
        let delegate = Keypair::generate();
        let (verifier, directory) = setup(&owner);
        directory.add_delegate(&account(), delegate.actor_id());
        let ticket = signed_ticket(&delegate, AccountState::genesis());

        let verified = verifier
            .verify(&ticket, &ActorId::new("anyone"), &periphery())
            .unwrap();
        assert_eq!(verified.signer, delegate.actor_id());
    }

    #[test]
    fn stale_state_rejected_after_consumption() {
        let owner = Keypair::generate();
        let (verifier, directory) = setup(&owner);
        let ticket = signed_ticket(&owner, AccountState::genesis());

        let verified = verifier
            .verify(&ticket, &ActorId::new("anyone"), &periphery())
            .unwrap();

        // Consuming the ticket advances the account; a resubmission must fail.
        directory.set_state(&account(), verified.post_state);
        let result = verifier.verify(&ticket, &ActorId::new("anyone"), &periphery());
        assert!(matches!(result, Err(TicketError::StaleState { .. })));
    }

    #[test]
    fn racing_tickets_serialize() {
        let owner = Keypair::generate();
        let (verifier, directory) = setup(&owner);

        // Two tickets computed against the same pre-state.
        let first = signed_ticket(&owner, AccountState::genesis());
        let second = PermissionTicket::builder(account(), periphery())
            .request(ModuleId::new("metadata"), Selector::new("set_all"))
            .signed(&owner, AccountState::genesis());

        let verified = verifier
            .verify(&first, &ActorId::new("anyone"), &periphery())
            .unwrap();
        directory.set_state(&account(), verified.post_state);

        let result = verifier.verify(&second, &ActorId::new("anyone"), &periphery());
        assert!(matches!(result, Err(TicketError::StaleState { .. })));
    }

    #[test]
    fn unsigned_ticket_accepted_for_owner() {
        let owner = Keypair::generate();
        let (verifier, _) = setup(&owner);
        let ticket = PermissionTicket::builder(account(), periphery())
            .request(ModuleId::new("metadata"), Selector::new("set_all"))
            .direct(AccountState::genesis());

        let verified = verifier
            .verify(&ticket, &owner.actor_id(), &periphery())
            .unwrap();
        assert_eq!(verified.mode, VerificationMode::DirectOwner);
        // No consumption: the account state is untouched.
        assert_eq!(verified.post_state, AccountState::genesis());
    }

    #[test]
    fn unsigned_ticket_rejected_for_non_owner() {
        let owner = Keypair::generate();
        let (verifier, _) = setup(&owner);
        let ticket = PermissionTicket::builder(account(), periphery())
            .request(ModuleId::new("metadata"), Selector::new("set_all"))
            .direct(AccountState::genesis());

        let result = verifier.verify(&ticket, &ActorId::new("stranger"), &periphery());
        assert!(matches!(
            result,
            Err(TicketError::UnsignedCallerNotOwner { .. })
        ));
    }
}
