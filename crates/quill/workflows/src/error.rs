use thiserror::Error;

use quill_access::{AccessError, GrantError};
use quill_protocol::ProtocolError;
use quill_ticket::TicketError;
use quill_types::ActorId;

/// Workflow-layer failures.
///
/// Validation conditions are checked eagerly, before any side effect, and
/// each gets its own variant. Authorization and collaborator failures pass
/// through transparently so the caller sees the original error identity.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("no license terms data supplied")]
    NoTermsData,

    #[error("no parent assets supplied")]
    NoParentAssets,

    #[error("parallel list length mismatch: {left} items, {right} companions")]
    LengthMismatch { left: usize, right: usize },

    #[error("batch contains no calls")]
    EmptyBatch,

    #[error("batch of {len} calls exceeds the limit of {max}")]
    BatchTooLarge { len: usize, max: usize },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("{0} is not the service operator")]
    NotOperator(ActorId),

    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<GrantError> for WorkflowError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::Ticket(err) => WorkflowError::Ticket(err),
            GrantError::Access(err) => WorkflowError::Access(err),
        }
    }
}
