use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use quill_ticket::{
    PermissionTicket, TicketError, TicketVerifier, VerificationMode, VerifiedTicket,
};
use quill_types::ActorId;

use crate::controller::{AccessController, AccessError, GrantKey};
use crate::unit::UnitOfWork;

/// Grantor-level failures: either the ticket did not verify, or the install
/// itself failed. Both preserve the underlying error identity.
#[derive(Debug, Error)]
pub enum GrantError {
    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Turns verified permission tickets into installed grants.
///
/// Verification and installation share one unit of work, so a failed batch
/// leaves zero grants behind and the consuming state advance is rolled back
/// together with everything else on abort.
pub struct PermissionGrantor {
    access: Arc<AccessController>,
    verifier: TicketVerifier,
}

impl PermissionGrantor {
    pub fn new(access: Arc<AccessController>) -> Self {
        let verifier = TicketVerifier::new(access.clone());
        Self { access, verifier }
    }

    pub fn verifier(&self) -> &TicketVerifier {
        &self.verifier
    }

    /// Verify one ticket and install its grants.
    ///
    /// A `DirectOwner` ticket installs nothing and consumes nothing: the
    /// caller already holds the authority it needs.
    pub fn grant(
        &self,
        unit: &mut UnitOfWork,
        ticket: &PermissionTicket,
        caller: &ActorId,
        executor: &ActorId,
    ) -> Result<VerifiedTicket, GrantError> {
        let verified = self.verifier.verify(ticket, caller, executor)?;

        if verified.mode == VerificationMode::DirectOwner {
            debug!(
                account = %verified.account.short_id(),
                "direct-owner authority, no grant installed"
            );
            return Ok(verified);
        }

        for request in &verified.requests {
            self.access.install_grant(
                unit,
                GrantKey {
                    account: verified.account.clone(),
                    grantee: executor.clone(),
                    module: request.module.clone(),
                    selector: request.selector.clone(),
                },
                verified.scope,
            )?;
        }
        // Consuming the ticket advances the account's optimistic lock.
        self.access
            .advance_state(unit, &verified.account, verified.post_state)?;

        info!(
            account = %verified.account.short_id(),
            grantee = %executor.short_id(),
            requests = verified.requests.len(),
            scope = ?verified.scope,
            post_state = %verified.post_state,
            "permission granted"
        );
        Ok(verified)
    }

    /// Verify and install an ordered batch of tickets atomically.
    ///
    /// Installation goes through a sub-unit: if any ticket fails, the
    /// sub-unit is aborted and not a single grant from the batch survives.
    /// Within the batch, each install advances the account state, so tickets
    /// must chain their expected states in submission order.
    pub fn grant_batch(
        &self,
        unit: &mut UnitOfWork,
        tickets: &[PermissionTicket],
        caller: &ActorId,
        executor: &ActorId,
    ) -> Result<Vec<VerifiedTicket>, GrantError> {
        let mut sub = UnitOfWork::new();
        let mut verified = Vec::with_capacity(tickets.len());

        for ticket in tickets {
            match self.grant(&mut sub, ticket, caller, executor) {
                Ok(v) => verified.push(v),
                Err(err) => {
                    self.access.abort(sub)?;
                    return Err(err);
                }
            }
        }

        unit.merge(sub);
        Ok(verified)
    }
}
