//! Derivative workflows: registering an asset as a derivative of existing
//! parents, taking a license from each parent.
//!
//! The parent and terms lists are parallel and their order is significant —
//! it fixes the link order and the result indices. Mismatched lengths are
//! rejected before anything is minted or registered.

use tracing::info;

use quill_access::UnitOfWork;
use quill_ticket::PermissionTicket;
use quill_types::{ActorId, AssetMetadata, CollectionId, DerivativeSpec, ItemId};

use crate::error::WorkflowError;
use crate::receipts::RegistrationReceipt;
use crate::service::WorkflowService;

impl WorkflowService {
    /// Mint a new item, register it, and link it as a derivative of
    /// `spec.parents`. The periphery owns the item for the duration of the
    /// call, so no tickets are needed.
    pub async fn mint_and_register_derivative(
        &self,
        caller: &ActorId,
        collection: &CollectionId,
        recipient: &ActorId,
        metadata: &AssetMetadata,
        spec: &DerivativeSpec,
    ) -> Result<RegistrationReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .mint_and_register_derivative_in(&mut unit, caller, collection, recipient, metadata, spec)
            .await
        {
            Ok(receipt) => {
                self.finish(unit, checkpoint)?;
                Ok(receipt)
            }
            Err(err) => {
                self.roll_back(unit, checkpoint);
                Err(err)
            }
        }
    }

    /// Register an existing item as a derivative on behalf of its holder.
    /// The tickets must cover the metadata write and the derivative link on
    /// the new account; each chained action consumes its own ticket.
    pub async fn register_derivative(
        &self,
        caller: &ActorId,
        collection: &CollectionId,
        item: ItemId,
        metadata: &AssetMetadata,
        spec: &DerivativeSpec,
        tickets: &[PermissionTicket],
    ) -> Result<RegistrationReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .register_derivative_in(&mut unit, caller, collection, item, metadata, spec, tickets)
            .await
        {
            Ok(receipt) => {
                self.finish(unit, checkpoint)?;
                Ok(receipt)
            }
            Err(err) => {
                self.roll_back(unit, checkpoint);
                Err(err)
            }
        }
    }

    // ── Inner bodies ─────────────────────────────────────────────────

    /// Eager validation shared by both variants: runs before any mint,
    /// registration or grant.
    async fn validate_derivative_spec(&self, spec: &DerivativeSpec) -> Result<(), WorkflowError> {
        if spec.parents.is_empty() {
            return Err(WorkflowError::NoParentAssets);
        }
        if spec.parents.len() != spec.terms.len() {
            return Err(WorkflowError::LengthMismatch {
                left: spec.parents.len(),
                right: spec.terms.len(),
            });
        }
        for parent in &spec.parents {
            if !self.services.registry.is_registered(parent).await {
                return Err(quill_protocol::ProtocolError::AssetNotFound(parent.clone()).into());
            }
        }
        Ok(())
    }

    pub(crate) async fn mint_and_register_derivative_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        collection: &CollectionId,
        recipient: &ActorId,
        metadata: &AssetMetadata,
        spec: &DerivativeSpec,
    ) -> Result<RegistrationReceipt, WorkflowError> {
        self.validate_derivative_spec(spec).await?;

        let item = self
            .services
            .minter
            .mint_item(&self.identity, collection, &self.identity)
            .await?;
        let asset = self
            .services
            .registry
            .register(unit, &self.identity, self.config.domain, collection, item)
            .await?;
        self.services
            .metadata
            .set_all(&self.identity, &asset, metadata)
            .await?;
        self.services
            .licensing
            .register_derivative(&self.identity, &asset, &spec.parents, &spec.terms)
            .await?;
        self.services
            .registry
            .transfer_asset(unit, &self.identity, &asset, recipient)
            .await?;

        info!(
            caller = %caller.short_id(),
            asset = %asset.short_id(),
            parents = spec.parents.len(),
            "derivative minted and registered"
        );
        Ok(RegistrationReceipt {
            asset,
            item,
            terms: spec.terms.iter().map(|t| t.terms_id).collect(),
        })
    }

    pub(crate) async fn register_derivative_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        collection: &CollectionId,
        item: ItemId,
        metadata: &AssetMetadata,
        spec: &DerivativeSpec,
        tickets: &[PermissionTicket],
    ) -> Result<RegistrationReceipt, WorkflowError> {
        self.validate_derivative_spec(spec).await?;

        let asset = self
            .services
            .registry
            .register(unit, caller, self.config.domain, collection, item)
            .await?;

        let verified = self.authorize_batch(unit, tickets, caller)?;
        // Owner-direct when every ticket rode the direct branch (or none
        // were supplied); delegated authority otherwise.
        let acting = if verified
            .iter()
            .all(|v| v.mode == quill_ticket::VerificationMode::DirectOwner)
        {
            caller.clone()
        } else {
            self.identity.clone()
        };

        self.services
            .metadata
            .set_all(&acting, &asset, metadata)
            .await?;
        self.services
            .licensing
            .register_derivative(&acting, &asset, &spec.parents, &spec.terms)
            .await?;

        info!(
            caller = %caller.short_id(),
            asset = %asset.short_id(),
            parents = spec.parents.len(),
            "existing item registered as derivative"
        );
        Ok(RegistrationReceipt {
            asset,
            item,
            terms: spec.terms.iter().map(|t| t.terms_id).collect(),
        })
    }
}
