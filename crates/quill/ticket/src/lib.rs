//! Permission tickets — the authorization protocol of the Quill periphery.
//!
//! A ticket is an off-line-signed authorization bound to one account, one
//! deadline, and an expected account state. It permits one specific executor
//! to invoke an ordered set of (module, selector) pairs exactly once. The
//! expected-state binding makes consumption single-shot: the account state
//! advances when a ticket is consumed, so a replay (or a racing ticket
//! computed against the same pre-state) fails verification.

#![deny(unsafe_code)]

pub mod mocks;
pub mod ticket;
pub mod verifier;

pub use ticket::{
    expected_post_state, GrantScope, PermissionRequest, PermissionTicket, PermissionTicketBuilder,
    TicketAuthorization,
};
pub use verifier::{
    AccountDirectory, TicketError, TicketVerifier, VerificationMode, VerifiedTicket,
};
