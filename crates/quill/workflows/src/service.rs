use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use quill_access::{AccessController, PermissionGrantor, UnitOfWork};
use quill_protocol::{
    AssetRegistry, CheckpointId, Grouping, ItemMinter, Licensing, MetadataStore, ProtocolJournal,
    Royalty,
};
use quill_ticket::{PermissionTicket, VerificationMode, VerifiedTicket};
use quill_types::ActorId;

use crate::batch::WorkflowCall;
use crate::config::WorkflowsConfig;
use crate::error::WorkflowError;
use crate::receipts::WorkflowReceipt;

/// The core-protocol collaborators a workflow service coordinates.
#[derive(Clone)]
pub struct Services {
    pub minter: Arc<dyn ItemMinter>,
    pub registry: Arc<dyn AssetRegistry>,
    pub licensing: Arc<dyn Licensing>,
    pub royalty: Arc<dyn Royalty>,
    pub grouping: Arc<dyn Grouping>,
    pub metadata: Arc<dyn MetadataStore>,
    pub journal: Arc<dyn ProtocolJournal>,
}

/// Version reporting for upgrade coordination.
pub trait Upgradeable {
    fn version(&self) -> &'static str;
}

/// Operator-gated administration surface.
pub trait AccessRestricted {
    fn operator(&self) -> &ActorId;

    fn ensure_operator(&self, caller: &ActorId) -> Result<(), WorkflowError>;
}

/// Ordered, all-or-nothing aggregation of workflow calls.
#[async_trait]
pub trait BatchCallable {
    async fn execute_batch(
        &self,
        caller: &ActorId,
        calls: Vec<WorkflowCall>,
    ) -> Result<Vec<WorkflowReceipt>, WorkflowError>;
}

/// The composite workflow orchestrator.
///
/// Holds no mutable state across calls beyond configuration: every entry
/// point builds its own unit of work and protocol checkpoint, and either
/// commits both or rolls both back.
pub struct WorkflowService {
    pub(crate) identity: ActorId,
    operator: ActorId,
    pub(crate) config: WorkflowsConfig,
    pub(crate) access: Arc<AccessController>,
    pub(crate) grantor: PermissionGrantor,
    pub(crate) services: Services,
}

impl WorkflowService {
    pub fn new(
        identity: ActorId,
        operator: ActorId,
        config: WorkflowsConfig,
        access: Arc<AccessController>,
        services: Services,
    ) -> Self {
        let grantor = PermissionGrantor::new(access.clone());
        Self {
            identity,
            operator,
            config,
            access,
            grantor,
            services,
        }
    }

    /// The actor identity this service performs delegated calls under.
    pub fn identity(&self) -> &ActorId {
        &self.identity
    }

    pub fn config(&self) -> &WorkflowsConfig {
        &self.config
    }

    /// Replace the configuration. Operator only.
    pub fn set_config(
        &mut self,
        caller: &ActorId,
        config: WorkflowsConfig,
    ) -> Result<(), WorkflowError> {
        self.ensure_operator(caller)?;
        self.config = config;
        Ok(())
    }

    // ── Unit-of-work bracketing ──────────────────────────────────────

    pub(crate) fn begin(&self) -> (UnitOfWork, CheckpointId) {
        (UnitOfWork::new(), self.services.journal.checkpoint())
    }

    /// Finalize phase: commit the unit (transient grants die here) and
    /// release the protocol checkpoint.
    pub(crate) fn finish(
        &self,
        unit: UnitOfWork,
        checkpoint: CheckpointId,
    ) -> Result<(), WorkflowError> {
        self.access.commit(unit)?;
        self.services.journal.release(checkpoint);
        Ok(())
    }

    /// Revert everything the unit touched. The caller's original error is
    /// what crosses the boundary; a rollback failure is only logged.
    pub(crate) fn roll_back(&self, unit: UnitOfWork, checkpoint: CheckpointId) {
        if let Err(err) = self.access.abort(unit) {
            warn!(error = %err, "unit-of-work abort failed");
        }
        self.services.journal.rollback_to(checkpoint);
    }

    // ── Authorize phase ──────────────────────────────────────────────

    pub(crate) fn authorize(
        &self,
        unit: &mut UnitOfWork,
        ticket: &PermissionTicket,
        caller: &ActorId,
    ) -> Result<VerifiedTicket, WorkflowError> {
        self.grantor
            .grant(unit, ticket, caller, &self.identity)
            .map_err(Into::into)
    }

    pub(crate) fn authorize_batch(
        &self,
        unit: &mut UnitOfWork,
        tickets: &[PermissionTicket],
        caller: &ActorId,
    ) -> Result<Vec<VerifiedTicket>, WorkflowError> {
        self.grantor
            .grant_batch(unit, tickets, caller, &self.identity)
            .map_err(Into::into)
    }

    /// The identity the Act phase performs a verified ticket's calls under:
    /// the periphery itself for delegated tickets, the submitting caller when
    /// the ticket rode the direct-owner branch.
    pub(crate) fn acting<'a>(
        &'a self,
        verified: &VerifiedTicket,
        caller: &'a ActorId,
    ) -> &'a ActorId {
        match verified.mode {
            VerificationMode::Delegated => &self.identity,
            VerificationMode::DirectOwner => caller,
        }
    }
}

impl Upgradeable for WorkflowService {
    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

impl AccessRestricted for WorkflowService {
    fn operator(&self) -> &ActorId {
        &self.operator
    }

    fn ensure_operator(&self, caller: &ActorId) -> Result<(), WorkflowError> {
        if caller == &self.operator {
            Ok(())
        } else {
            Err(WorkflowError::NotOperator(caller.clone()))
        }
    }
}
