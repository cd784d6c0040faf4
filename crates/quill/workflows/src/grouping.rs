//! Grouping workflows: registering groups and adding member assets, each
//! addition authorized by that asset's owner.

use tracing::info;

use quill_access::UnitOfWork;
use quill_ticket::PermissionTicket;
use quill_types::{ActorId, AssetId, GroupId, PoolId};

use crate::error::WorkflowError;
use crate::receipts::{DistributionReceipt, GroupReceipt};
use crate::service::WorkflowService;

impl WorkflowService {
    /// Register an empty group backed by a reward pool.
    pub async fn register_group(
        &self,
        caller: &ActorId,
        pool: &PoolId,
    ) -> Result<GroupReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self.register_group_in(&mut unit, caller, pool).await {
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

    /// Register a group and add member assets in one call. One ticket per
    /// asset, in asset order — adding to a group is a restricted action on
    /// each member's account, so each needs a grant from its own owner.
    pub async fn register_group_and_add(
        &self,
        caller: &ActorId,
        pool: &PoolId,
        assets: &[AssetId],
        tickets: &[PermissionTicket],
    ) -> Result<GroupReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self
            .register_group_and_add_in(&mut unit, caller, pool, assets, tickets)
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

    /// Drain the group's reward pool into member vaults.
    pub async fn collect_and_distribute(
        &self,
        caller: &ActorId,
        group: &GroupId,
    ) -> Result<DistributionReceipt, WorkflowError> {
        let (mut unit, checkpoint) = self.begin();
        match self.collect_and_distribute_in(&mut unit, caller, group).await {
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

    pub(crate) async fn register_group_in(
        &self,
        _unit: &mut UnitOfWork,
        caller: &ActorId,
        pool: &PoolId,
    ) -> Result<GroupReceipt, WorkflowError> {
        let group = self.services.grouping.register_group(caller, pool).await?;
        info!(caller = %caller.short_id(), group = %group, "group registered");
        Ok(GroupReceipt {
            group,
            added: Vec::new(),
        })
    }

    pub(crate) async fn register_group_and_add_in(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        pool: &PoolId,
        assets: &[AssetId],
        tickets: &[PermissionTicket],
    ) -> Result<GroupReceipt, WorkflowError> {
        if assets.len() != tickets.len() {
            return Err(WorkflowError::LengthMismatch {
                left: assets.len(),
                right: tickets.len(),
            });
        }

        let group = self.services.grouping.register_group(caller, pool).await?;

        for (asset, ticket) in assets.iter().zip(tickets.iter()) {
            let verified = self.authorize(unit, ticket, caller)?;
            let acting = self.acting(&verified, caller).clone();
            self.services
                .grouping
                .add_to_group(&acting, &group, std::slice::from_ref(asset))
                .await?;
        }

        info!(
            caller = %caller.short_id(),
            group = %group,
            members = assets.len(),
            "group registered with members"
        );
        Ok(GroupReceipt {
            group,
            added: assets.to_vec(),
        })
    }

    pub(crate) async fn collect_and_distribute_in(
        &self,
        _unit: &mut UnitOfWork,
        caller: &ActorId,
        group: &GroupId,
    ) -> Result<DistributionReceipt, WorkflowError> {
        let amounts = self
            .services
            .grouping
            .collect_and_claim(caller, group)
            .await?;
        info!(group = %group, members = amounts.len(), "group rewards distributed");
        Ok(DistributionReceipt {
            group: group.clone(),
            amounts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{harness, metadata, user_with_collection, Harness};
    use quill_crypto::Keypair;
    use quill_protocol::surface;
    use quill_types::{AccountId, AccountState};

    async fn registered_asset(h: &Harness, name: &str) -> (Keypair, AssetId) {
        let (user, collection) = user_with_collection(h, name).await;
        let receipt = h
            .service
            .mint_and_register(&user.actor_id(), &collection, &user.actor_id(), &metadata(name))
            .await
            .unwrap();
        (user, receipt.asset)
    }

    fn grouping_ticket(h: &Harness, owner: &Keypair, asset: &AssetId) -> PermissionTicket {
        PermissionTicket::builder(AccountId::for_asset(asset), h.periphery())
            .request(
                surface::modules::grouping(),
                surface::selectors::add_to_group(),
            )
            .signed(owner, AccountState::genesis())
    }

    #[tokio::test]
    async fn register_empty_group() {
        let h = harness();
        let receipt = h
            .service
            .register_group(&ActorId::new("curator"), &PoolId::new("pool-1"))
            .await
            .unwrap();
        assert!(receipt.added.is_empty());
        assert!(h.protocol.group_members(&receipt.group).is_empty());
    }

    #[tokio::test]
    async fn register_group_and_add_with_per_owner_tickets() {
        let h = harness();
        let (owner_a, asset_a) = registered_asset(&h, "a").await;
        let (owner_b, asset_b) = registered_asset(&h, "b").await;

        let tickets = vec![
            grouping_ticket(&h, &owner_a, &asset_a),
            grouping_ticket(&h, &owner_b, &asset_b),
        ];
        let receipt = h
            .service
            .register_group_and_add(
                &ActorId::new("curator"),
                &PoolId::new("pool-1"),
                &[asset_a.clone(), asset_b.clone()],
                &tickets,
            )
            .await
            .unwrap();

        assert_eq!(receipt.added, vec![asset_a.clone(), asset_b.clone()]);
        assert_eq!(
            h.protocol.group_members(&receipt.group),
            vec![asset_a, asset_b]
        );
        assert!(h.access.grants_snapshot().is_empty());
    }

    #[tokio::test]
    async fn ticket_asset_mismatch_rejected_eagerly() {
        let h = harness();
        let (owner_a, asset_a) = registered_asset(&h, "a").await;
        let (_, asset_b) = registered_asset(&h, "b").await;

        // 2 assets, 1 ticket.
        let tickets = vec![grouping_ticket(&h, &owner_a, &asset_a)];
        let result = h
            .service
            .register_group_and_add(
                &ActorId::new("curator"),
                &PoolId::new("pool-1"),
                &[asset_a, asset_b],
                &tickets,
            )
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::LengthMismatch { left: 2, right: 1 })
        ));
    }

    #[tokio::test]
    async fn bad_member_ticket_rolls_back_the_group() {
        let h = harness();
        let (owner_a, asset_a) = registered_asset(&h, "a").await;
        let (_, asset_b) = registered_asset(&h, "b").await;
        let intruder = Keypair::generate();

        let tickets = vec![
            grouping_ticket(&h, &owner_a, &asset_a),
            // Signed by someone with no authority over asset B.
            grouping_ticket(&h, &intruder, &asset_b),
        ];
        let result = h
            .service
            .register_group_and_add(
                &ActorId::new("curator"),
                &PoolId::new("pool-1"),
                &[asset_a.clone(), asset_b],
                &tickets,
            )
            .await;

        assert!(result.is_err());
        // The group registration and the first member's grant both reverted.
        assert!(h.access.grants_snapshot().is_empty());
        let account_a = AccountId::for_asset(&asset_a);
        assert_eq!(h.access.record_of(&account_a).unwrap().state.version, 0);
    }

    #[tokio::test]
    async fn rewards_distribute_in_member_order() {
        let h = harness();
        let (owner_a, asset_a) = registered_asset(&h, "a").await;
        let (owner_b, asset_b) = registered_asset(&h, "b").await;

        let pool = PoolId::new("pool-1");
        let tickets = vec![
            grouping_ticket(&h, &owner_a, &asset_a),
            grouping_ticket(&h, &owner_b, &asset_b),
        ];
        let receipt = h
            .service
            .register_group_and_add(
                &ActorId::new("curator"),
                &pool,
                &[asset_a.clone(), asset_b.clone()],
                &tickets,
            )
            .await
            .unwrap();

        h.protocol.fund_rewards(&pool, 100);
        let distribution = h
            .service
            .collect_and_distribute(&ActorId::new("curator"), &receipt.group)
            .await
            .unwrap();

        assert_eq!(distribution.amounts, vec![50, 50]);
        assert_eq!(h.protocol.vault_balance(&asset_a), 50);
        assert_eq!(h.protocol.vault_balance(&asset_b), 50);
    }
}
