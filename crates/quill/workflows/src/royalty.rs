//! Royalty workflows: payments into asset vaults and bulk revenue claims.
//!
//! The bulk claim is the one workflow with partial-success tolerance: a child
//! with nothing claimable is skipped by matching that exact collaborator
//! error, while any other failure aborts the whole call.

use tracing::{info, warn};

use quill_access::UnitOfWork;
use quill_protocol::ProtocolError;
use quill_types::{ActorId, AssetId};

use crate::error::WorkflowError;
use crate::receipts::{ClaimReceipt, ClaimedRevenue, PaymentReceipt};
use crate::service::WorkflowService;

impl WorkflowService {
    /// Pay revenue into `receiver`'s vault on behalf of the caller.
    pub async fn pay_royalty_on_behalf(
        &self,
        caller: &ActorId,
        receiver: &AssetId,
        amount: u64,
    ) -> Result<PaymentReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .pay_royalty_on_behalf_in(&mut unit, caller, receiver, amount)
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

    /// Claim the revenue accrued for `ancestor` across `children`, in order.
    ///
    /// A child with nothing claimable is skipped; every other failure aborts
    /// the whole call.
    pub async fn claim_all_revenue(
        &self,
        caller: &ActorId,
        ancestor: &AssetId,
        children: &[AssetId],
    ) -> Result<ClaimReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .claim_all_revenue_in(&mut unit, caller, ancestor, children)
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

    pub(crate) async fn pay_royalty_on_behalf_in(
        &self,
        _unit: &mut UnitOfWork,
        caller: &ActorId,
        receiver: &AssetId,
        amount: u64,
    ) -> Result<PaymentReceipt, WorkflowError> {
        if amount == 0 {
            return Err(WorkflowError::ZeroAmount);
        }

        self.services
            .royalty
            .pay_on_behalf(caller, receiver, amount)
            .await?;
        info!(
            caller = %caller.short_id(),
            receiver = %receiver.short_id(),
            amount,
            "royalty paid"
        );
        Ok(PaymentReceipt {
            receiver: receiver.clone(),
            amount,
        })
    }

    pub(crate) async fn claim_all_revenue_in(
        &self,
        _unit: &mut UnitOfWork,
        caller: &ActorId,
        ancestor: &AssetId,
        children: &[AssetId],
    ) -> Result<ClaimReceipt, WorkflowError> {
        let mut claims = Vec::new();
        let mut skipped = Vec::new();

        for child in children {
            match self
                .services
                .royalty
                .claim_revenue(caller, ancestor, child)
                .await
            {
                Ok(amounts) => claims.push(ClaimedRevenue {
                    source: child.clone(),
                    amounts,
                }),
                // The one tolerated condition, matched by identity: this
                // child simply has nothing for us. Anything else is a real
                // failure and aborts the whole claim.
                Err(ProtocolError::NothingToClaim { .. }) => {
                    warn!(
                        ancestor = %ancestor.short_id(),
                        child = %child.short_id(),
                        "nothing to claim, skipping source"
                    );
                    skipped.push(child.clone());
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(
            ancestor = %ancestor.short_id(),
            effective = claims.len(),
            skipped = skipped.len(),
            "bulk revenue claim finished"
        );
        Ok(ClaimReceipt {
            ancestor: ancestor.clone(),
            claims,
            skipped,
        })
    }
}
