use async_trait::async_trait;

use quill_access::UnitOfWork;
use quill_types::{
    ActorId, AssetId, AssetMetadata, CollectionId, DomainId, GroupId, ItemId, LicenseTerms,
    LicenseTokenId, LicensingConfig, PoolId, TemplateId, TermsId, TermsRef, VaultId,
};

use crate::error::ProtocolError;

/// The asset registry: turns a held item into a registered asset fronted by
/// an account. Registration is permissionless; ownership follows the holder.
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// Register `item` of `collection` under `domain`. Creates the asset's
    /// account (owned by the current item holder) inside `unit`.
    async fn register(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        domain: DomainId,
        collection: &CollectionId,
        item: ItemId,
    ) -> Result<AssetId, ProtocolError>;

    async fn is_registered(&self, asset: &AssetId) -> bool;

    /// Hand the item and its account to `to`. Caller must hold both.
    async fn transfer_asset(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        asset: &AssetId,
        to: &ActorId,
    ) -> Result<(), ProtocolError>;
}

/// The licensing module.
#[async_trait]
pub trait Licensing: Send + Sync {
    /// Register license terms under a template. Content-addressed: an
    /// identical payload resolves to the already-assigned identifier.
    async fn register_terms(
        &self,
        template: &TemplateId,
        payload: &LicenseTerms,
    ) -> Result<TermsId, ProtocolError>;

    /// Attach registered terms to an asset. Idempotent when already attached.
    async fn attach_terms(
        &self,
        caller: &ActorId,
        asset: &AssetId,
        terms: &TermsRef,
    ) -> Result<(), ProtocolError>;

    async fn set_licensing_config(
        &self,
        caller: &ActorId,
        asset: &AssetId,
        terms: &TermsRef,
        config: &LicensingConfig,
    ) -> Result<(), ProtocolError>;

    /// Mint `amount` license tokens for attached terms; the minting fee is
    /// charged to `payer`.
    async fn mint_license_tokens(
        &self,
        caller: &ActorId,
        payer: &ActorId,
        asset: &AssetId,
        terms: &TermsRef,
        amount: u64,
        receiver: &ActorId,
    ) -> Result<Vec<LicenseTokenId>, ProtocolError>;

    /// Link `child` to its parents. Each `terms[i]` must be attached to
    /// `parents[i]`. A child can be linked at most once.
    async fn register_derivative(
        &self,
        caller: &ActorId,
        child: &AssetId,
        parents: &[AssetId],
        terms: &[TermsRef],
    ) -> Result<(), ProtocolError>;
}

/// The royalty module.
#[async_trait]
pub trait Royalty: Send + Sync {
    /// Deploy (or return) the royalty vault of an asset.
    async fn deploy_vault(&self, asset: &AssetId) -> Result<VaultId, ProtocolError>;

    /// Pay revenue to `receiver`'s vault on behalf of `caller`; ancestor
    /// shares accrue per the attached terms of the receiver's parent links.
    async fn pay_on_behalf(
        &self,
        caller: &ActorId,
        receiver: &AssetId,
        amount: u64,
    ) -> Result<(), ProtocolError>;

    /// Claim the revenue accrued in `child`'s vault for `ancestor`.
    /// Fails with [`ProtocolError::NothingToClaim`] when nothing accrued.
    async fn claim_revenue(
        &self,
        caller: &ActorId,
        ancestor: &AssetId,
        child: &AssetId,
    ) -> Result<Vec<u64>, ProtocolError>;
}

/// The grouping module.
#[async_trait]
pub trait Grouping: Send + Sync {
    async fn register_group(
        &self,
        caller: &ActorId,
        pool: &PoolId,
    ) -> Result<GroupId, ProtocolError>;

    /// Add assets to a group, in order. Each asset's account must permit the
    /// caller to do so.
    async fn add_to_group(
        &self,
        caller: &ActorId,
        group: &GroupId,
        assets: &[AssetId],
    ) -> Result<(), ProtocolError>;

    /// Drain the group's reward pool into member vaults; returns the amount
    /// credited per member, in member order.
    async fn collect_and_claim(
        &self,
        caller: &ActorId,
        group: &GroupId,
    ) -> Result<Vec<u64>, ProtocolError>;
}

/// Asset metadata storage.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn set_all(
        &self,
        caller: &ActorId,
        asset: &AssetId,
        metadata: &AssetMetadata,
    ) -> Result<(), ProtocolError>;

    async fn get(&self, asset: &AssetId) -> Option<AssetMetadata>;
}

/// The collection contract: mints the items assets are registered from.
#[async_trait]
pub trait ItemMinter: Send + Sync {
    async fn create_collection(
        &self,
        caller: &ActorId,
        name: &str,
    ) -> Result<CollectionId, ProtocolError>;

    /// Mint the next item of `collection` to `to`. Item ids are sequential
    /// from 1, so clients can precompute the asset id of the next mint.
    async fn mint_item(
        &self,
        caller: &ActorId,
        collection: &CollectionId,
        to: &ActorId,
    ) -> Result<ItemId, ProtocolError>;

    async fn holder_of(
        &self,
        collection: &CollectionId,
        item: ItemId,
    ) -> Result<ActorId, ProtocolError>;
}

/// Checkpoint token handed out by [`ProtocolJournal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CheckpointId(pub u64);

/// Whole-protocol checkpointing.
///
/// The blockchain original gets Act-phase rollback for free from transaction
/// revert; here the workflow layer brackets every composite call with a
/// checkpoint so collaborator state is all-or-nothing too.
pub trait ProtocolJournal: Send + Sync {
    fn checkpoint(&self) -> CheckpointId;

    /// Restore the state captured at `cp` and discard younger checkpoints.
    fn rollback_to(&self, cp: CheckpointId);

    /// Discard the checkpoint without restoring.
    fn release(&self, cp: CheckpointId);
}
