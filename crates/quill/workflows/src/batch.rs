//! The batch executor: ordered, all-or-nothing aggregation of workflow
//! calls.
//!
//! The executor has no business logic of its own. It runs every call inside
//! one shared unit of work and protocol checkpoint, so the first failure
//! reverts everything the batch touched and surfaces with its original error
//! identity. Tickets inside a batch must chain their expected account states
//! in call order — the executor performs no speculative simulation, a broken
//! chain simply verifies as stale.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use quill_access::UnitOfWork;
use quill_ticket::PermissionTicket;
use quill_types::{
    ActorId, AssetId, AssetMetadata, CollectionId, DerivativeSpec, GroupId, ItemId, PoolId,
    TermsAttachment, TermsRef,
};

use crate::error::WorkflowError;
use crate::receipts::WorkflowReceipt;
use crate::service::{BatchCallable, WorkflowService};

/// One encoded call to a workflow entry point.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WorkflowCall {
    MintAndRegister {
        collection: CollectionId,
        recipient: ActorId,
        metadata: AssetMetadata,
    },
    MintAndRegisterWithTerms {
        collection: CollectionId,
        recipient: ActorId,
        metadata: AssetMetadata,
        attachments: Vec<TermsAttachment>,
    },
    RegisterAsset {
        collection: CollectionId,
        item: ItemId,
        metadata: AssetMetadata,
        ticket: PermissionTicket,
    },
    RegisterAssetWithTerms {
        collection: CollectionId,
        item: ItemId,
        metadata: AssetMetadata,
        attachments: Vec<TermsAttachment>,
        ticket: PermissionTicket,
    },
    AttachLicenseTerms {
        asset: AssetId,
        attachments: Vec<TermsAttachment>,
        ticket: PermissionTicket,
    },
    MintLicenseTokens {
        asset: AssetId,
        terms: TermsRef,
        amount: u64,
        receiver: ActorId,
        ticket: PermissionTicket,
    },
    MintAndRegisterDerivative {
        collection: CollectionId,
        recipient: ActorId,
        metadata: AssetMetadata,
        spec: DerivativeSpec,
    },
    RegisterDerivative {
        collection: CollectionId,
        item: ItemId,
        metadata: AssetMetadata,
        spec: DerivativeSpec,
        tickets: Vec<PermissionTicket>,
    },
    RegisterGroup {
        pool: PoolId,
    },
    RegisterGroupAndAdd {
        pool: PoolId,
        assets: Vec<AssetId>,
        tickets: Vec<PermissionTicket>,
    },
    CollectAndDistribute {
        group: GroupId,
    },
    PayRoyalty {
        receiver: AssetId,
        amount: u64,
    },
    ClaimAllRevenue {
        ancestor: AssetId,
        children: Vec<AssetId>,
    },
}

impl WorkflowService {
    async fn dispatch_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        call: &WorkflowCall,
    ) -> Result<WorkflowReceipt, WorkflowError> {
        match call {
            WorkflowCall::MintAndRegister {
                collection,
                recipient,
                metadata,
            } => self
                .mint_and_register_in(unit, caller, collection, recipient, metadata)
                .await
                .map(WorkflowReceipt::Registration),
            WorkflowCall::MintAndRegisterWithTerms {
                collection,
                recipient,
                metadata,
                attachments,
            } => self
                .mint_and_register_with_terms_in(
                    unit, caller, collection, recipient, metadata, attachments,
                )
                .await
                .map(WorkflowReceipt::Registration),
            WorkflowCall::RegisterAsset {
                collection,
                item,
                metadata,
                ticket,
            } => self
                .register_asset_in(unit, caller, collection, *item, metadata, ticket)
                .await
                .map(WorkflowReceipt::Registration),
            WorkflowCall::RegisterAssetWithTerms {
                collection,
                item,
                metadata,
                attachments,
                ticket,
            } => self
                .register_asset_with_terms_in(
                    unit, caller, collection, *item, metadata, attachments, ticket,
                )
                .await
                .map(WorkflowReceipt::Registration),
            WorkflowCall::AttachLicenseTerms {
                asset,
                attachments,
                ticket,
            } => self
                .attach_license_terms_in(unit, caller, asset, attachments, ticket)
                .await
                .map(WorkflowReceipt::Terms),
            WorkflowCall::MintLicenseTokens {
                asset,
                terms,
                amount,
                receiver,
                ticket,
            } => self
                .mint_license_tokens_in(unit, caller, asset, terms, *amount, receiver, ticket)
                .await
                .map(WorkflowReceipt::LicenseTokens),
            WorkflowCall::MintAndRegisterDerivative {
                collection,
                recipient,
                metadata,
                spec,
            } => self
                .mint_and_register_derivative_in(
                    unit, caller, collection, recipient, metadata, spec,
                )
                .await
                .map(WorkflowReceipt::Registration),
            WorkflowCall::RegisterDerivative {
                collection,
                item,
                metadata,
                spec,
                tickets,
            } => self
                .register_derivative_in(unit, caller, collection, *item, metadata, spec, tickets)
                .await
                .map(WorkflowReceipt::Registration),
            WorkflowCall::RegisterGroup { pool } => self
                .register_group_in(unit, caller, pool)
                .await
                .map(WorkflowReceipt::Group),
            WorkflowCall::RegisterGroupAndAdd {
                pool,
                assets,
                tickets,
            } => self
                .register_group_and_add_in(unit, caller, pool, assets, tickets)
                .await
                .map(WorkflowReceipt::Group),
            WorkflowCall::CollectAndDistribute { group } => self
                .collect_and_distribute_in(unit, caller, group)
                .await
                .map(WorkflowReceipt::Distribution),
            WorkflowCall::PayRoyalty { receiver, amount } => self
                .pay_royalty_on_behalf_in(unit, caller, receiver, *amount)
                .await
                .map(WorkflowReceipt::Payment),
            WorkflowCall::ClaimAllRevenue { ancestor, children } => self
                .claim_all_revenue_in(unit, caller, ancestor, children)
                .await
                .map(WorkflowReceipt::Claim),
        }
    }
}

#[async_trait]
impl BatchCallable for WorkflowService {
    async fn execute_batch(
        &self,
        caller: &ActorId,
        calls: Vec<WorkflowCall>,
    ) -> Result<Vec<WorkflowReceipt>, WorkflowError> {
        if calls.is_empty() {
            return Err(WorkflowError::EmptyBatch);
        }
        if calls.len() > self.config.max_batch_calls {
            return Err(WorkflowError::BatchTooLarge {
                len: calls.len(),
                max: self.config.max_batch_calls,
            });
        }

        let (mut unit, checkpoint) = self.begin();
        let mut receipts = Vec::with_capacity(calls.len());

        for call in &calls {
            match self.dispatch_in(&mut unit, caller, call).await {
                Ok(receipt) => receipts.push(receipt),
                Err(err) => {
                    self.roll_back(unit, checkpoint);
                    return Err(err);
                }
            }
        }

        self.finish(unit, checkpoint)?;
        info!(
            caller = %caller.short_id(),
            calls = receipts.len(),
            "batch executed"
        );
        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{harness, metadata, user_with_collection};
    use quill_protocol::surface;
    use quill_types::{AccountId, AccountState, ItemId};

    #[tokio::test]
    async fn receipts_come_back_in_call_order() {
        let h = harness();
        let (user, collection) = user_with_collection(&h, "art").await;
        let recipient = user.actor_id();

        let calls: Vec<WorkflowCall> = (0..3)
            .map(|i| WorkflowCall::MintAndRegister {
                collection: collection.clone(),
                recipient: recipient.clone(),
                metadata: metadata(&format!("m{i}")),
            })
            .collect();

        // Round-trip the encoded batch the way an off-line client would
        // submit it.
        let encoded = serde_json::to_string(&calls).unwrap();
        let decoded: Vec<WorkflowCall> = serde_json::from_str(&encoded).unwrap();

        let receipts = h.service.execute_batch(&recipient, decoded).await.unwrap();

        assert_eq!(receipts.len(), 3);
        for (index, receipt) in receipts.iter().enumerate() {
            match receipt {
                WorkflowReceipt::Registration(r) => {
                    assert_eq!(r.item, ItemId(index as u64 + 1));
                }
                other => panic!("unexpected receipt {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn failing_call_reverts_the_whole_batch() {
        let h = harness();
        let (user, collection) = user_with_collection(&h, "art").await;
        let recipient = user.actor_id();

        let calls = vec![
            WorkflowCall::MintAndRegister {
                collection: collection.clone(),
                recipient: recipient.clone(),
                metadata: metadata("ok"),
            },
            // Empty attachments: rejected with its original error identity.
            WorkflowCall::MintAndRegisterWithTerms {
                collection: collection.clone(),
                recipient: recipient.clone(),
                metadata: metadata("bad"),
                attachments: vec![],
            },
        ];

        let result = h.service.execute_batch(&recipient, calls).await;
        assert!(matches!(result, Err(WorkflowError::NoTermsData)));

        // The successful first call was rolled back with the rest, mint
        // included.
        assert_eq!(h.protocol.minted_items(&collection), 0);
        let first_asset =
            quill_types::AssetId::derive(h.service.config().domain, &collection, ItemId(1));
        assert!(h.access.record_of(&AccountId::for_asset(&first_asset)).is_err());
        assert!(h.access.grants_snapshot().is_empty());
    }

    #[tokio::test]
    async fn tickets_chain_across_batched_calls() {
        let h = harness();
        let (user, collection) = user_with_collection(&h, "art").await;
        let owner = user.actor_id();

        let registered = h
            .service
            .mint_and_register(&owner, &collection, &owner, &metadata("a"))
            .await
            .unwrap();
        let asset = registered.asset;
        let account = AccountId::for_asset(&asset);

        // Two attachment calls in one batch: the second ticket's expected
        // pre-state is the first ticket's post-state.
        let first = PermissionTicket::builder(account.clone(), h.periphery())
            .request(
                surface::modules::licensing(),
                surface::selectors::attach_terms(),
            )
            .request(
                surface::modules::licensing(),
                surface::selectors::set_licensing_config(),
            )
            .signed(&user, AccountState::genesis());
        let second = PermissionTicket::builder(account.clone(), h.periphery())
            .request(
                surface::modules::licensing(),
                surface::selectors::attach_terms(),
            )
            .request(
                surface::modules::licensing(),
                surface::selectors::set_licensing_config(),
            )
            .signed(&user, first.expected_state);

        let attachment = |bps: u16| TermsAttachment {
            template: quill_types::TemplateId::new("pil"),
            terms: quill_types::LicenseTerms::commercial(bps),
            config: quill_types::LicensingConfig::default(),
        };
        let calls = vec![
            WorkflowCall::AttachLicenseTerms {
                asset: asset.clone(),
                attachments: vec![attachment(100)],
                ticket: first,
            },
            WorkflowCall::AttachLicenseTerms {
                asset: asset.clone(),
                attachments: vec![attachment(200)],
                ticket: second,
            },
        ];

        let receipts = h
            .service
            .execute_batch(&ActorId::new("relayer"), calls)
            .await
            .unwrap();

        assert_eq!(receipts.len(), 2);
        assert_eq!(h.protocol.attached_terms(&asset).len(), 2);
        // Two tickets of two requests each were consumed in order.
        assert_eq!(h.access.record_of(&account).unwrap().state.version, 4);
        assert!(h.access.grants_snapshot().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_rejected() {
        let h = harness();
        let result = h
            .service
            .execute_batch(&ActorId::new("anyone"), Vec::new())
            .await;
        assert!(matches!(result, Err(WorkflowError::EmptyBatch)));
    }

    #[tokio::test]
    async fn oversized_batch_rejected() {
        let h = harness();
        let (user, collection) = user_with_collection(&h, "art").await;
        let recipient = user.actor_id();

        let calls: Vec<WorkflowCall> = (0..h.service.config().max_batch_calls + 1)
            .map(|_| WorkflowCall::MintAndRegister {
                collection: collection.clone(),
                recipient: recipient.clone(),
                metadata: metadata("m"),
            })
            .collect();

        let result = h.service.execute_batch(&recipient, calls).await;
        assert!(matches!(result, Err(WorkflowError::BatchTooLarge { .. })));
    }
}
