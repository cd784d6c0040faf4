use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use quill_crypto::{Keypair, PublicKey, Signature};
use quill_types::{AccountId, AccountState, ActorId, ModuleId, Selector};

/// Scope of a permission grant installed from a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantScope {
    /// Dies at the end of the unit of work that installed it.
    Transient,
    /// Remains until explicitly revoked.
    Persistent,
}

/// One (target module, function selector) pair a ticket authorizes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub module: ModuleId,
    pub selector: Selector,
}

impl PermissionRequest {
    pub fn new(module: ModuleId, selector: Selector) -> Self {
        Self { module, selector }
    }

    /// Canonical encoding fed into the account state chain.
    pub fn encode(&self) -> Vec<u8> {
        format!("grant:{}/{}", self.module, self.selector).into_bytes()
    }
}

/// How a ticket is authorized.
///
/// `DirectOwner` is the explicit "no authorization requested" branch: the
/// submitting caller claims to be the account owner acting directly, so no
/// signature travels with the ticket and no grant is installed from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketAuthorization {
    Signed {
        signer: PublicKey,
        signature: Signature,
    },
    DirectOwner,
}

/// An off-line-signed permission ticket.
///
/// Batch tickets carry more than one request; the requests are ordered and
/// one combined signature covers the whole batch. `expected_state` is the
/// state the account reaches after consuming the ticket, chained with
/// [`expected_post_state`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTicket {
    pub account: AccountId,
    /// The periphery caller this ticket authorizes.
    pub executor: ActorId,
    pub requests: Vec<PermissionRequest>,
    pub scope: GrantScope,
    pub deadline: DateTime<Utc>,
    pub expected_state: AccountState,
    pub authorization: TicketAuthorization,
}

/// Deterministic post-state after consuming an ordered request list.
///
/// Pure function of `(current, requests)`; clients use it to chain the
/// expected states of consecutive tickets off-line.
pub fn expected_post_state(current: AccountState, requests: &[PermissionRequest]) -> AccountState {
    requests
        .iter()
        .fold(current, |state, request| state.advance(&request.encode()))
}

impl PermissionTicket {
    /// Start building a ticket for `account`, authorizing `executor`.
    pub fn builder(account: AccountId, executor: ActorId) -> PermissionTicketBuilder {
        PermissionTicketBuilder {
            account,
            executor,
            requests: Vec::new(),
            scope: GrantScope::Transient,
            deadline: Utc::now() + Duration::hours(1),
        }
    }

    /// The domain-separated digest the signature covers.
    pub fn signing_digest(&self) -> [u8; 32] {
        let mut parts: Vec<Vec<u8>> = vec![
            self.account.0.as_bytes().to_vec(),
            self.executor.0.as_bytes().to_vec(),
            vec![match self.scope {
                GrantScope::Transient => 0u8,
                GrantScope::Persistent => 1u8,
            }],
            self.deadline.timestamp_millis().to_le_bytes().to_vec(),
            self.expected_state.version.to_le_bytes().to_vec(),
            self.expected_state.digest.to_vec(),
        ];
        for request in &self.requests {
            parts.push(request.encode());
        }
        let part_refs: Vec<&[u8]> = parts.iter().map(|p| p.as_slice()).collect();
        quill_crypto::domain_digest("quill-permission-ticket-v1:", &part_refs)
    }
}

/// Builder for [`PermissionTicket`].
pub struct PermissionTicketBuilder {
    account: AccountId,
    executor: ActorId,
    requests: Vec<PermissionRequest>,
    scope: GrantScope,
    deadline: DateTime<Utc>,
}

impl PermissionTicketBuilder {
    pub fn request(mut self, module: ModuleId, selector: Selector) -> Self {
        self.requests.push(PermissionRequest::new(module, selector));
        self
    }

    pub fn requests(mut self, requests: Vec<PermissionRequest>) -> Self {
        self.requests = requests;
        self
    }

    pub fn scope(mut self, scope: GrantScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.scope = GrantScope::Persistent;
        self
    }

    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Finish as a signed ticket: chain the expected state from
    /// `current_state` and sign the canonical digest with `keypair`.
    pub fn signed(self, keypair: &Keypair, current_state: AccountState) -> PermissionTicket {
        let expected_state = expected_post_state(current_state, &self.requests);
        let mut ticket = PermissionTicket {
            account: self.account,
            executor: self.executor,
            requests: self.requests,
            scope: self.scope,
            deadline: self.deadline,
            expected_state,
            authorization: TicketAuthorization::DirectOwner,
        };
        let digest = ticket.signing_digest();
        ticket.authorization = TicketAuthorization::Signed {
            signer: keypair.public(),
            signature: keypair.sign(&digest),
        };
        ticket
    }

    /// Finish as an unsigned direct-owner ticket. Valid only when submitted
    /// by the account owner; the expected state is left untouched because no
    /// grant is consumed.
    pub fn direct(self, current_state: AccountState) -> PermissionTicket {
        PermissionTicket {
            account: self.account,
            executor: self.executor,
            requests: self.requests,
            scope: self.scope,
            deadline: self.deadline,
            expected_state: current_state,
            authorization: TicketAuthorization::DirectOwner,
        }
    }
}
