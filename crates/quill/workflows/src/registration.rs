//! Registration workflows: mint-and-register, and registration of existing
//! items on behalf of their holders.
//!
//! The mint variants mint the item to the periphery itself, act as its owner
//! for the duration of the call, and hand the item and its account to the
//! recipient in Finalize — so no tickets are needed. The register variants
//! operate on items the periphery never holds and take a permission ticket
//! for every restricted step.

use tracing::info;

use quill_access::UnitOfWork;
use quill_ticket::PermissionTicket;
use quill_types::{ActorId, AssetMetadata, CollectionId, ItemId, TermsAttachment};

use crate::error::WorkflowError;
use crate::receipts::RegistrationReceipt;
use crate::service::WorkflowService;

impl WorkflowService {
    /// Mint a new item, register it as an asset, set its metadata, and hand
    /// everything to `recipient`.
    pub async fn mint_and_register(
        &self,
        caller: &ActorId,
        collection: &CollectionId,
        recipient: &ActorId,
        metadata: &AssetMetadata,
    ) -> Result<RegistrationReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .mint_and_register_in(&mut unit, caller, collection, recipient, metadata)
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

    /// Mint, register, set metadata, attach license terms with their
    /// configurations, then hand everything to `recipient`.
    ///
    /// An empty attachment list is rejected before anything is minted.
    pub async fn mint_and_register_with_terms(
        &self,
        caller: &ActorId,
        collection: &CollectionId,
        recipient: &ActorId,
        metadata: &AssetMetadata,
        attachments: &[TermsAttachment],
    ) -> Result<RegistrationReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .mint_and_register_with_terms_in(
                &mut unit, caller, collection, recipient, metadata, attachments,
            )
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

    /// Register an existing item as an asset on behalf of its holder. The
    /// ticket authorizes the metadata write on the new account.
    pub async fn register_asset(
        &self,
        caller: &ActorId,
        collection: &CollectionId,
        item: ItemId,
        metadata: &AssetMetadata,
        ticket: &PermissionTicket,
    ) -> Result<RegistrationReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .register_asset_in(&mut unit, caller, collection, item, metadata, ticket)
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

    /// Register an existing item and attach license terms. The ticket must
    /// cover the metadata write and both licensing steps.
    pub async fn register_asset_with_terms(
        &self,
        caller: &ActorId,
        collection: &CollectionId,
        item: ItemId,
        metadata: &AssetMetadata,
        attachments: &[TermsAttachment],
        ticket: &PermissionTicket,
    ) -> Result<RegistrationReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .register_asset_with_terms_in(
                &mut unit, caller, collection, item, metadata, attachments, ticket,
            )
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

    // ── Inner bodies (shared with the batch executor) ────────────────

    pub(crate) async fn mint_and_register_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        collection: &CollectionId,
        recipient: &ActorId,
        metadata: &AssetMetadata,
    ) -> Result<RegistrationReceipt, WorkflowError> {
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
            .registry
            .transfer_asset(unit, &self.identity, &asset, recipient)
            .await?;

        info!(
            caller = %caller.short_id(),
            asset = %asset.short_id(),
            item = %item,
            recipient = %recipient.short_id(),
            "asset minted and registered"
        );
        Ok(RegistrationReceipt {
            asset,
            item,
            terms: Vec::new(),
        })
    }

    pub(crate) async fn mint_and_register_with_terms_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        collection: &CollectionId,
        recipient: &ActorId,
        metadata: &AssetMetadata,
        attachments: &[TermsAttachment],
    ) -> Result<RegistrationReceipt, WorkflowError> {
        if attachments.is_empty() {
            return Err(WorkflowError::NoTermsData);
        }

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
        let terms = self
            .attach_terms_as(&self.identity, &asset, attachments)
            .await?;
        self.services
            .registry
            .transfer_asset(unit, &self.identity, &asset, recipient)
            .await?;

        info!(
            caller = %caller.short_id(),
            asset = %asset.short_id(),
            terms = terms.len(),
            "asset minted and registered with terms"
        );
        Ok(RegistrationReceipt { asset, item, terms })
    }

    pub(crate) async fn register_asset_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        collection: &CollectionId,
        item: ItemId,
        metadata: &AssetMetadata,
        ticket: &PermissionTicket,
    ) -> Result<RegistrationReceipt, WorkflowError> {
        let asset = self
            .services
            .registry
            .register(unit, caller, self.config.domain, collection, item)
            .await?;

        let verified = self.authorize(unit, ticket, caller)?;
        let acting = self.acting(&verified, caller).clone();
        self.services
            .metadata
            .set_all(&acting, &asset, metadata)
            .await?;

        info!(
            caller = %caller.short_id(),
            asset = %asset.short_id(),
            item = %item,
            "existing item registered"
        );
        Ok(RegistrationReceipt {
            asset,
            item,
            terms: Vec::new(),
        })
    }

    pub(crate) async fn register_asset_with_terms_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        collection: &CollectionId,
        item: ItemId,
        metadata: &AssetMetadata,
        attachments: &[TermsAttachment],
        ticket: &PermissionTicket,
    ) -> Result<RegistrationReceipt, WorkflowError> {
        if attachments.is_empty() {
            return Err(WorkflowError::NoTermsData);
        }

        let asset = self
            .services
            .registry
            .register(unit, caller, self.config.domain, collection, item)
            .await?;

        let verified = self.authorize(unit, ticket, caller)?;
        let acting = self.acting(&verified, caller).clone();
        self.services
            .metadata
            .set_all(&acting, &asset, metadata)
            .await?;
        let terms = self.attach_terms_as(&acting, &asset, attachments).await?;

        info!(
            caller = %caller.short_id(),
            asset = %asset.short_id(),
            terms = terms.len(),
            "existing item registered with terms"
        );
        Ok(RegistrationReceipt { asset, item, terms })
    }
}
