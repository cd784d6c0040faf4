//! License workflows: attaching terms to existing assets and minting
//! license tokens.

use tracing::info;

use quill_access::UnitOfWork;
use quill_ticket::PermissionTicket;
use quill_types::{ActorId, AssetId, TermsAttachment, TermsId, TermsRef};

use crate::error::WorkflowError;
use crate::receipts::{LicenseTokensReceipt, TermsReceipt};
use crate::service::WorkflowService;

impl WorkflowService {
    /// Attach license terms (with their configurations) to a registered
    /// asset. The ticket must cover the licensing selectors involved.
    ///
    /// Idempotent at the terms level: an identical payload resolves to the
    /// already-registered terms identifier.
    pub async fn attach_license_terms(
        &self,
        caller: &ActorId,
        asset: &AssetId,
        attachments: &[TermsAttachment],
        ticket: &PermissionTicket,
    ) -> Result<TermsReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .attach_license_terms_in(&mut unit, caller, asset, attachments, ticket)
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

    /// Mint license tokens for terms attached to `asset`; the minting fee is
    /// charged to the submitting caller.
    pub async fn mint_license_tokens(
        &self,
        caller: &ActorId,
        asset: &AssetId,
        terms: &TermsRef,
        amount: u64,
        receiver: &ActorId,
        ticket: &PermissionTicket,
    ) -> Result<LicenseTokensReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .mint_license_tokens_in(&mut unit, caller, asset, terms, amount, receiver, ticket)
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

    /// Register, attach and configure each attachment, acting as `acting`.
    /// Returns the terms identifiers in attachment order.
    pub(crate) async fn attach_terms_as(
        &self,
        acting: &ActorId,
        asset: &AssetId,
        attachments: &[TermsAttachment],
    ) -> Result<Vec<TermsId>, WorkflowError> {
        let mut ids = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let terms_id = self
                .services
                .licensing
                .register_terms(&attachment.template, &attachment.terms)
                .await?;
            let terms_ref = TermsRef {
                template: attachment.template.clone(),
                terms_id,
            };
            self.services
                .licensing
                .attach_terms(acting, asset, &terms_ref)
                .await?;
            self.services
                .licensing
                .set_licensing_config(acting, asset, &terms_ref, &attachment.config)
                .await?;
            ids.push(terms_id);
        }
        Ok(ids)
    }

    pub(crate) async fn attach_license_terms_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        asset: &AssetId,
        attachments: &[TermsAttachment],
        ticket: &PermissionTicket,
    ) -> Result<TermsReceipt, WorkflowError> {
        if attachments.is_empty() {
            return Err(WorkflowError::NoTermsData);
        }

        let verified = self.authorize(unit, ticket, caller)?;
        let acting = self.acting(&verified, caller).clone();
        let terms = self.attach_terms_as(&acting, asset, attachments).await?;

        info!(
            caller = %caller.short_id(),
            asset = %asset.short_id(),
            terms = terms.len(),
            "license terms attached"
        );
        Ok(TermsReceipt {
            asset: asset.clone(),
            terms,
        })
    }

    pub(crate) async fn mint_license_tokens_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        asset: &AssetId,
        terms: &TermsRef,
        amount: u64,
        receiver: &ActorId,
        ticket: &PermissionTicket,
    ) -> Result<LicenseTokensReceipt, WorkflowError> {
        if amount == 0 {
            return Err(WorkflowError::ZeroAmount);
        }

        let verified = self.authorize(unit, ticket, caller)?;
        let acting = self.acting(&verified, caller).clone();
        let tokens = self
            .services
            .licensing
            .mint_license_tokens(&acting, caller, asset, terms, amount, receiver)
            .await?;

        info!(
            caller = %caller.short_id(),
            asset = %asset.short_id(),
            tokens = tokens.len(),
            "license tokens minted"
        );
        Ok(LicenseTokensReceipt {
            asset: asset.clone(),
            tokens,
        })
    }
}
