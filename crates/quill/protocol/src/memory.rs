//! In-memory reference implementation of the core-protocol collaborators.
//!
//! One state struct behind one lock implements every service trait, enforcing
//! the account access list on each restricted operation. A checkpoint is a
//! clone of the whole state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use quill_access::{AccessController, AccessError, UnitOfWork};
use quill_types::{
    AccountId, ActorId, AssetId, AssetMetadata, CollectionId, DomainId, GroupId, ItemId,
    LicenseTerms, LicenseTokenId, LicensingConfig, ModuleId, PoolId, Selector, TemplateId, TermsId,
    TermsRef, VaultId,
};

use crate::error::ProtocolError;
use crate::surface::{modules, selectors};
use crate::traits::{
    AssetRegistry, CheckpointId, Grouping, ItemMinter, Licensing, MetadataStore, ProtocolJournal,
    Royalty,
};

#[derive(Clone, Default)]
struct CollectionRecord {
    next_item: u64,
    holders: HashMap<ItemId, ActorId>,
}

#[derive(Clone)]
struct AssetRecord {
    collection: CollectionId,
    item: ItemId,
}

#[derive(Clone)]
struct TermsRecord {
    template: TemplateId,
    payload: LicenseTerms,
}

#[derive(Clone, Default)]
struct VaultRecord {
    id: Option<VaultId>,
    balance: u64,
    /// Revenue accrued per ancestor, waiting to be claimed.
    pending: HashMap<AssetId, u64>,
}

#[derive(Clone)]
struct GroupRecord {
    pool: PoolId,
    members: Vec<AssetId>,
    reward_balance: u64,
}

#[derive(Clone, Default)]
struct ProtocolState {
    collections: HashMap<CollectionId, CollectionRecord>,
    assets: HashMap<AssetId, AssetRecord>,
    terms: HashMap<TermsId, TermsRecord>,
    terms_index: HashMap<[u8; 32], TermsId>,
    next_terms: u64,
    attachments: HashMap<AssetId, Vec<TermsRef>>,
    configs: HashMap<(AssetId, TemplateId, TermsId), LicensingConfig>,
    next_license_token: u64,
    license_tokens: HashMap<LicenseTokenId, (AssetId, TermsId, ActorId)>,
    derivatives: HashMap<AssetId, Vec<(AssetId, TermsRef)>>,
    vaults: HashMap<AssetId, VaultRecord>,
    balances: HashMap<ActorId, u64>,
    groups: HashMap<GroupId, GroupRecord>,
    metadata: HashMap<AssetId, AssetMetadata>,
}

/// In-memory core protocol, permission-checked against an access controller.
pub struct MemoryProtocol {
    access: Arc<AccessController>,
    state: RwLock<ProtocolState>,
    checkpoints: Mutex<Vec<(CheckpointId, ProtocolState)>>,
    next_checkpoint: AtomicU64,
}

impl MemoryProtocol {
    pub fn new(access: Arc<AccessController>) -> Self {
        Self {
            access,
            state: RwLock::new(ProtocolState::default()),
            checkpoints: Mutex::new(Vec::new()),
            next_checkpoint: AtomicU64::new(1),
        }
    }

    fn ensure_allowed(
        &self,
        asset: &AssetId,
        caller: &ActorId,
        module: ModuleId,
        selector: Selector,
    ) -> Result<(), ProtocolError> {
        let account = AccountId::for_asset(asset);
        if self.access.is_allowed(&account, caller, &module, &selector) {
            Ok(())
        } else {
            Err(ProtocolError::PermissionDenied {
                account,
                caller: caller.clone(),
                module,
                selector,
            })
        }
    }

    fn terms_content_key(template: &TemplateId, payload: &LicenseTerms) -> [u8; 32] {
        let encoded = serde_json::to_vec(&(template, payload)).unwrap_or_default();
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"quill-license-terms-v1:");
        hasher.update(&encoded);
        *hasher.finalize().as_bytes()
    }

    // ── Test fixtures and inspection ─────────────────────────────────

    /// Credit spendable balance to an actor (funding fixture).
    pub fn credit(&self, actor: &ActorId, amount: u64) {
        if let Ok(mut state) = self.state.write() {
            *state.balances.entry(actor.clone()).or_default() += amount;
        }
    }

    pub fn balance_of(&self, actor: &ActorId) -> u64 {
        self.state
            .read()
            .ok()
            .and_then(|s| s.balances.get(actor).copied())
            .unwrap_or(0)
    }

    pub fn vault_balance(&self, asset: &AssetId) -> u64 {
        self.state
            .read()
            .ok()
            .and_then(|s| s.vaults.get(asset).map(|v| v.balance))
            .unwrap_or(0)
    }

    /// Fund the reward pool backing a group (funding fixture).
    pub fn fund_rewards(&self, pool: &PoolId, amount: u64) {
        if let Ok(mut state) = self.state.write() {
            for record in state.groups.values_mut() {
                if record.pool == *pool {
                    record.reward_balance += amount;
                }
            }
        }
    }

    pub fn attached_terms(&self, asset: &AssetId) -> Vec<TermsRef> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.attachments.get(asset).cloned())
            .unwrap_or_default()
    }

    pub fn group_members(&self, group: &GroupId) -> Vec<AssetId> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.groups.get(group).map(|g| g.members.clone()))
            .unwrap_or_default()
    }

    /// Number of items minted so far in a collection.
    pub fn minted_items(&self, collection: &CollectionId) -> u64 {
        self.state
            .read()
            .ok()
            .and_then(|s| s.collections.get(collection).map(|c| c.next_item))
            .unwrap_or(0)
    }
}

#[async_trait]
impl ItemMinter for MemoryProtocol {
    async fn create_collection(
        &self,
        _caller: &ActorId,
        name: &str,
    ) -> Result<CollectionId, ProtocolError> {
        let collection = CollectionId::new(name);
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if state.collections.contains_key(&collection) {
            return Err(ProtocolError::CollectionExists(collection));
        }
        state
            .collections
            .insert(collection.clone(), CollectionRecord::default());
        Ok(collection)
    }

    async fn mint_item(
        &self,
        _caller: &ActorId,
        collection: &CollectionId,
        to: &ActorId,
    ) -> Result<ItemId, ProtocolError> {
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        let record = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| ProtocolError::CollectionNotFound(collection.clone()))?;
        record.next_item += 1;
        let item = ItemId(record.next_item);
        record.holders.insert(item, to.clone());
        debug!(collection = %collection, item = %item, to = %to.short_id(), "item minted");
        Ok(item)
    }

    async fn holder_of(
        &self,
        collection: &CollectionId,
        item: ItemId,
    ) -> Result<ActorId, ProtocolError> {
        let state = self.state.read().map_err(|_| AccessError::Lock)?;
        let record = state
            .collections
            .get(collection)
            .ok_or_else(|| ProtocolError::CollectionNotFound(collection.clone()))?;
        record
            .holders
            .get(&item)
            .cloned()
            .ok_or_else(|| ProtocolError::ItemNotFound {
                collection: collection.clone(),
                item,
            })
    }
}

#[async_trait]
impl AssetRegistry for MemoryProtocol {
    async fn register(
        &self,
        unit: &mut UnitOfWork,
        _caller: &ActorId,
        domain: DomainId,
        collection: &CollectionId,
        item: ItemId,
    ) -> Result<AssetId, ProtocolError> {
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        let holder = state
            .collections
            .get(collection)
            .ok_or_else(|| ProtocolError::CollectionNotFound(collection.clone()))?
            .holders
            .get(&item)
            .cloned()
            .ok_or_else(|| ProtocolError::ItemNotFound {
                collection: collection.clone(),
                item,
            })?;

        let asset = AssetId::derive(domain, collection, item);
        if state.assets.contains_key(&asset) {
            return Err(ProtocolError::AlreadyRegistered(asset));
        }

        // The account fronting the asset is owned by the item holder.
        self.access
            .register_account(unit, &asset, holder)
            .map_err(|err| match err {
                AccessError::AccountExists(_) => ProtocolError::AlreadyRegistered(asset.clone()),
                other => ProtocolError::Access(other),
            })?;

        state.assets.insert(
            asset.clone(),
            AssetRecord {
                collection: collection.clone(),
                item,
            },
        );
        debug!(asset = %asset.short_id(), "asset registered");
        Ok(asset)
    }

    async fn is_registered(&self, asset: &AssetId) -> bool {
        self.state
            .read()
            .map(|s| s.assets.contains_key(asset))
            .unwrap_or(false)
    }

    async fn transfer_asset(
        &self,
        unit: &mut UnitOfWork,
        caller: &ActorId,
        asset: &AssetId,
        to: &ActorId,
    ) -> Result<(), ProtocolError> {
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        let record = state
            .assets
            .get(asset)
            .cloned()
            .ok_or_else(|| ProtocolError::AssetNotFound(asset.clone()))?;

        let collection = state
            .collections
            .get_mut(&record.collection)
            .ok_or_else(|| ProtocolError::CollectionNotFound(record.collection.clone()))?;
        let holder = collection.holders.get_mut(&record.item).ok_or_else(|| {
            ProtocolError::ItemNotFound {
                collection: record.collection.clone(),
                item: record.item,
            }
        })?;
        if holder != caller {
            return Err(ProtocolError::NotItemHolder {
                caller: caller.clone(),
                collection: record.collection.clone(),
                item: record.item,
            });
        }
        *holder = to.clone();

        let account = AccountId::for_asset(asset);
        self.access
            .transfer_owner(unit, &account, caller, to.clone())?;
        Ok(())
    }
}

#[async_trait]
impl Licensing for MemoryProtocol {
    async fn register_terms(
        &self,
        template: &TemplateId,
        payload: &LicenseTerms,
    ) -> Result<TermsId, ProtocolError> {
        let key = Self::terms_content_key(template, payload);
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;

        if let Some(existing) = state.terms_index.get(&key) {
            return Ok(*existing);
        }

        state.next_terms += 1;
        let id = TermsId(state.next_terms);
        state.terms.insert(
            id,
            TermsRecord {
                template: template.clone(),
                payload: payload.clone(),
            },
        );
        state.terms_index.insert(key, id);
        debug!(terms = %id, template = %template, "license terms registered");
        Ok(id)
    }

    async fn attach_terms(
        &self,
        caller: &ActorId,
        asset: &AssetId,
        terms: &TermsRef,
    ) -> Result<(), ProtocolError> {
        self.ensure_allowed(asset, caller, modules::licensing(), selectors::attach_terms())?;

        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if !state.assets.contains_key(asset) {
            return Err(ProtocolError::AssetNotFound(asset.clone()));
        }
        if !state.terms.contains_key(&terms.terms_id) {
            return Err(ProtocolError::TermsNotFound(terms.terms_id));
        }

        let attached = state.attachments.entry(asset.clone()).or_default();
        if !attached.contains(terms) {
            attached.push(terms.clone());
        }
        Ok(())
    }

    async fn set_licensing_config(
        &self,
        caller: &ActorId,
        asset: &AssetId,
        terms: &TermsRef,
        config: &LicensingConfig,
    ) -> Result<(), ProtocolError> {
        self.ensure_allowed(
            asset,
            caller,
            modules::licensing(),
            selectors::set_licensing_config(),
        )?;

        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if !state.assets.contains_key(asset) {
            return Err(ProtocolError::AssetNotFound(asset.clone()));
        }
        if !state.terms.contains_key(&terms.terms_id) {
            return Err(ProtocolError::TermsNotFound(terms.terms_id));
        }
        state.configs.insert(
            (asset.clone(), terms.template.clone(), terms.terms_id),
            config.clone(),
        );
        Ok(())
    }

    async fn mint_license_tokens(
        &self,
        caller: &ActorId,
        payer: &ActorId,
        asset: &AssetId,
        terms: &TermsRef,
        amount: u64,
        receiver: &ActorId,
    ) -> Result<Vec<LicenseTokenId>, ProtocolError> {
        self.ensure_allowed(
            asset,
            caller,
            modules::licensing(),
            selectors::mint_license_tokens(),
        )?;

        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if !state.assets.contains_key(asset) {
            return Err(ProtocolError::AssetNotFound(asset.clone()));
        }
        let attached = state
            .attachments
            .get(asset)
            .map(|a| a.contains(terms))
            .unwrap_or(false);
        if !attached {
            return Err(ProtocolError::TermsNotAttached {
                asset: asset.clone(),
                terms: terms.terms_id,
            });
        }

        let config_key = (asset.clone(), terms.template.clone(), terms.terms_id);
        let config = state.configs.get(&config_key).cloned().unwrap_or_default();
        if config.disabled {
            return Err(ProtocolError::LicensingDisabled {
                asset: asset.clone(),
                terms: terms.terms_id,
            });
        }

        let fee = config.minting_fee.saturating_mul(amount);
        if fee > 0 {
            let available = state.balances.get(payer).copied().unwrap_or(0);
            if available < fee {
                return Err(ProtocolError::InsufficientFunds {
                    needed: fee,
                    available,
                });
            }
            *state.balances.entry(payer.clone()).or_default() -= fee;
            state.vaults.entry(asset.clone()).or_default().balance += fee;
        }

        let mut minted = Vec::with_capacity(amount as usize);
        for _ in 0..amount {
            state.next_license_token += 1;
            let token = LicenseTokenId(state.next_license_token);
            state
                .license_tokens
                .insert(token, (asset.clone(), terms.terms_id, receiver.clone()));
            minted.push(token);
        }
        debug!(asset = %asset.short_id(), count = minted.len(), "license tokens minted");
        Ok(minted)
    }

    async fn register_derivative(
        &self,
        caller: &ActorId,
        child: &AssetId,
        parents: &[AssetId],
        terms: &[TermsRef],
    ) -> Result<(), ProtocolError> {
        self.ensure_allowed(
            child,
            caller,
            modules::licensing(),
            selectors::register_derivative(),
        )?;

        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if !state.assets.contains_key(child) {
            return Err(ProtocolError::AssetNotFound(child.clone()));
        }
        if state.derivatives.contains_key(child) {
            return Err(ProtocolError::DerivativeAlreadyRegistered(child.clone()));
        }

        for (parent, terms_ref) in parents.iter().zip(terms.iter()) {
            if !state.assets.contains_key(parent) {
                return Err(ProtocolError::AssetNotFound(parent.clone()));
            }
            let attached = state
                .attachments
                .get(parent)
                .map(|a| a.contains(terms_ref))
                .unwrap_or(false);
            if !attached {
                return Err(ProtocolError::TermsNotAttached {
                    asset: parent.clone(),
                    terms: terms_ref.terms_id,
                });
            }
        }

        let links = parents
            .iter()
            .cloned()
            .zip(terms.iter().cloned())
            .collect::<Vec<_>>();
        state.derivatives.insert(child.clone(), links);
        debug!(child = %child.short_id(), parents = parents.len(), "derivative registered");
        Ok(())
    }
}

#[async_trait]
impl Royalty for MemoryProtocol {
    async fn deploy_vault(&self, asset: &AssetId) -> Result<VaultId, ProtocolError> {
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if !state.assets.contains_key(asset) {
            return Err(ProtocolError::AssetNotFound(asset.clone()));
        }
        let vault = state.vaults.entry(asset.clone()).or_default();
        if let Some(id) = &vault.id {
            return Ok(id.clone());
        }
        let id = VaultId::new(format!("vault-{}", uuid::Uuid::new_v4()));
        vault.id = Some(id.clone());
        Ok(id)
    }

    async fn pay_on_behalf(
        &self,
        caller: &ActorId,
        receiver: &AssetId,
        amount: u64,
    ) -> Result<(), ProtocolError> {
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if !state.assets.contains_key(receiver) {
            return Err(ProtocolError::AssetNotFound(receiver.clone()));
        }

        let available = state.balances.get(caller).copied().unwrap_or(0);
        if available < amount {
            return Err(ProtocolError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        *state.balances.entry(caller.clone()).or_default() -= amount;

        // Ancestor shares accrue per the terms each parent link was taken under.
        let links = state.derivatives.get(receiver).cloned().unwrap_or_default();
        let mut distributed = 0u64;
        for (parent, terms_ref) in links {
            let share_bps = state
                .terms
                .get(&terms_ref.terms_id)
                .map(|t| t.payload.royalty_share_bps as u64)
                .unwrap_or(0);
            let share = amount.saturating_mul(share_bps) / 10_000;
            if share > 0 {
                let vault = state.vaults.entry(receiver.clone()).or_default();
                *vault.pending.entry(parent).or_default() += share;
                distributed += share;
            }
        }

        let vault = state.vaults.entry(receiver.clone()).or_default();
        vault.balance += amount - distributed;
        Ok(())
    }

    async fn claim_revenue(
        &self,
        _caller: &ActorId,
        ancestor: &AssetId,
        child: &AssetId,
    ) -> Result<Vec<u64>, ProtocolError> {
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if !state.assets.contains_key(child) {
            return Err(ProtocolError::AssetNotFound(child.clone()));
        }

        let claimed = state
            .vaults
            .get_mut(child)
            .and_then(|vault| vault.pending.remove(ancestor))
            .unwrap_or(0);
        if claimed == 0 {
            return Err(ProtocolError::NothingToClaim {
                child: child.clone(),
            });
        }

        state.vaults.entry(ancestor.clone()).or_default().balance += claimed;
        debug!(
            ancestor = %ancestor.short_id(),
            child = %child.short_id(),
            claimed,
            "revenue claimed"
        );
        Ok(vec![claimed])
    }
}

#[async_trait]
impl Grouping for MemoryProtocol {
    async fn register_group(
        &self,
        _caller: &ActorId,
        pool: &PoolId,
    ) -> Result<GroupId, ProtocolError> {
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        let group = GroupId::new(format!("group-{}", uuid::Uuid::new_v4()));
        state.groups.insert(
            group.clone(),
            GroupRecord {
                pool: pool.clone(),
                members: Vec::new(),
                reward_balance: 0,
            },
        );
        Ok(group)
    }

    async fn add_to_group(
        &self,
        caller: &ActorId,
        group: &GroupId,
        assets: &[AssetId],
    ) -> Result<(), ProtocolError> {
        // Validate everything before mutating anything.
        for asset in assets {
            self.ensure_allowed(asset, caller, modules::grouping(), selectors::add_to_group())?;
        }

        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if !state.groups.contains_key(group) {
            return Err(ProtocolError::GroupNotFound(group.clone()));
        }
        for asset in assets {
            if !state.assets.contains_key(asset) {
                return Err(ProtocolError::AssetNotFound(asset.clone()));
            }
        }

        let record = state
            .groups
            .get_mut(group)
            .ok_or_else(|| ProtocolError::GroupNotFound(group.clone()))?;
        for asset in assets {
            if !record.members.contains(asset) {
                record.members.push(asset.clone());
            }
        }
        Ok(())
    }

    async fn collect_and_claim(
        &self,
        _caller: &ActorId,
        group: &GroupId,
    ) -> Result<Vec<u64>, ProtocolError> {
        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        let record = state
            .groups
            .get(group)
            .cloned()
            .ok_or_else(|| ProtocolError::GroupNotFound(group.clone()))?;

        if record.members.is_empty() {
            return Ok(Vec::new());
        }

        let share = record.reward_balance / record.members.len() as u64;
        let mut credited = Vec::with_capacity(record.members.len());
        for member in &record.members {
            state.vaults.entry(member.clone()).or_default().balance += share;
            credited.push(share);
        }
        if let Some(live) = state.groups.get_mut(group) {
            live.reward_balance -= share * record.members.len() as u64;
        }
        Ok(credited)
    }
}

#[async_trait]
impl MetadataStore for MemoryProtocol {
    async fn set_all(
        &self,
        caller: &ActorId,
        asset: &AssetId,
        metadata: &AssetMetadata,
    ) -> Result<(), ProtocolError> {
        self.ensure_allowed(asset, caller, modules::metadata(), selectors::set_all())?;

        let mut state = self.state.write().map_err(|_| AccessError::Lock)?;
        if !state.assets.contains_key(asset) {
            return Err(ProtocolError::AssetNotFound(asset.clone()));
        }
        state.metadata.insert(asset.clone(), metadata.clone());
        Ok(())
    }

    async fn get(&self, asset: &AssetId) -> Option<AssetMetadata> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.metadata.get(asset).cloned())
    }
}

impl ProtocolJournal for MemoryProtocol {
    fn checkpoint(&self) -> CheckpointId {
        let id = CheckpointId(self.next_checkpoint.fetch_add(1, Ordering::SeqCst));
        let snapshot = self
            .state
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();
        if let Ok(mut checkpoints) = self.checkpoints.lock() {
            checkpoints.push((id, snapshot));
        }
        id
    }

    fn rollback_to(&self, cp: CheckpointId) {
        let snapshot = {
            let mut checkpoints = match self.checkpoints.lock() {
                Ok(checkpoints) => checkpoints,
                Err(_) => return,
            };
            let Some(position) = checkpoints.iter().position(|(id, _)| *id == cp) else {
                return;
            };
            let (_, snapshot) = checkpoints.swap_remove(position);
            checkpoints.truncate(position);
            snapshot
        };
        if let Ok(mut state) = self.state.write() {
            *state = snapshot;
        }
    }

    fn release(&self, cp: CheckpointId) {
        if let Ok(mut checkpoints) = self.checkpoints.lock() {
            checkpoints.retain(|(id, _)| *id != cp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<AccessController>, Arc<MemoryProtocol>) {
        let access = Arc::new(AccessController::new());
        let protocol = Arc::new(MemoryProtocol::new(access.clone()));
        (access, protocol)
    }

    async fn register_owned_asset(
        access: &AccessController,
        protocol: &MemoryProtocol,
        owner: &ActorId,
        name: &str,
    ) -> AssetId {
        let collection = protocol.create_collection(owner, name).await.unwrap();
        let item = protocol.mint_item(owner, &collection, owner).await.unwrap();
        let mut unit = UnitOfWork::new();
        let asset = protocol
            .register(&mut unit, owner, DomainId(1), &collection, item)
            .await
            .unwrap();
        access.commit(unit).unwrap();
        asset
    }

    #[tokio::test]
    async fn mint_ids_are_sequential() {
        let (_, protocol) = setup();
        let minter = ActorId::new("minter");
        let collection = protocol.create_collection(&minter, "art").await.unwrap();

        let first = protocol.mint_item(&minter, &collection, &minter).await.unwrap();
        let second = protocol.mint_item(&minter, &collection, &minter).await.unwrap();
        assert_eq!(first, ItemId(1));
        assert_eq!(second, ItemId(2));
    }

    #[tokio::test]
    async fn register_creates_account_owned_by_holder() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let asset = register_owned_asset(&access, &protocol, &owner, "art").await;

        assert!(protocol.is_registered(&asset).await);
        let record = access.record_of(&AccountId::for_asset(&asset)).unwrap();
        assert_eq!(record.owner, owner);
    }

    #[tokio::test]
    async fn double_registration_rejected() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        register_owned_asset(&access, &protocol, &owner, "art").await;

        let mut unit = UnitOfWork::new();
        let result = protocol
            .register(&mut unit, &owner, DomainId(1), &CollectionId::new("art"), ItemId(1))
            .await;
        assert!(matches!(result, Err(ProtocolError::AlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn register_terms_is_content_addressed() {
        let (_, protocol) = setup();
        let template = TemplateId::new("pil");

        let first = protocol
            .register_terms(&template, &LicenseTerms::commercial(500))
            .await
            .unwrap();
        let second = protocol
            .register_terms(&template, &LicenseTerms::commercial(500))
            .await
            .unwrap();
        let different = protocol
            .register_terms(&template, &LicenseTerms::commercial(600))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[tokio::test]
    async fn attach_requires_permission() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let asset = register_owned_asset(&access, &protocol, &owner, "art").await;
        let terms_id = protocol
            .register_terms(&TemplateId::new("pil"), &LicenseTerms::non_commercial())
            .await
            .unwrap();
        let terms = TermsRef {
            template: TemplateId::new("pil"),
            terms_id,
        };

        // A stranger lacks the grant.
        let result = protocol
            .attach_terms(&ActorId::new("stranger"), &asset, &terms)
            .await;
        assert!(matches!(result, Err(ProtocolError::PermissionDenied { .. })));

        // The owner is always allowed.
        protocol.attach_terms(&owner, &asset, &terms).await.unwrap();
        assert_eq!(protocol.attached_terms(&asset), vec![terms]);
    }

    #[tokio::test]
    async fn attach_is_idempotent() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let asset = register_owned_asset(&access, &protocol, &owner, "art").await;
        let terms_id = protocol
            .register_terms(&TemplateId::new("pil"), &LicenseTerms::non_commercial())
            .await
            .unwrap();
        let terms = TermsRef {
            template: TemplateId::new("pil"),
            terms_id,
        };

        protocol.attach_terms(&owner, &asset, &terms).await.unwrap();
        protocol.attach_terms(&owner, &asset, &terms).await.unwrap();
        assert_eq!(protocol.attached_terms(&asset).len(), 1);
    }

    #[tokio::test]
    async fn mint_license_tokens_charges_fee() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let buyer = ActorId::new("buyer");
        let asset = register_owned_asset(&access, &protocol, &owner, "art").await;

        let template = TemplateId::new("pil");
        let terms_id = protocol
            .register_terms(&template, &LicenseTerms::commercial(500))
            .await
            .unwrap();
        let terms = TermsRef {
            template,
            terms_id,
        };
        protocol.attach_terms(&owner, &asset, &terms).await.unwrap();
        protocol
            .set_licensing_config(
                &owner,
                &asset,
                &terms,
                &LicensingConfig {
                    minting_fee: 10,
                    disabled: false,
                    hook_data: None,
                },
            )
            .await
            .unwrap();

        // Underfunded payer is rejected.
        let result = protocol
            .mint_license_tokens(&owner, &buyer, &asset, &terms, 3, &buyer)
            .await;
        assert!(matches!(result, Err(ProtocolError::InsufficientFunds { .. })));

        protocol.credit(&buyer, 100);
        let tokens = protocol
            .mint_license_tokens(&owner, &buyer, &asset, &terms, 3, &buyer)
            .await
            .unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(protocol.balance_of(&buyer), 70);
        assert_eq!(protocol.vault_balance(&asset), 30);
    }

    #[tokio::test]
    async fn derivative_revenue_flows_to_parent() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let parent = register_owned_asset(&access, &protocol, &owner, "parents").await;
        let child = register_owned_asset(&access, &protocol, &owner, "children").await;

        let template = TemplateId::new("pil");
        let terms_id = protocol
            .register_terms(&template, &LicenseTerms::commercial(1_000)) // 10%
            .await
            .unwrap();
        let terms = TermsRef {
            template,
            terms_id,
        };
        protocol.attach_terms(&owner, &parent, &terms).await.unwrap();
        protocol
            .register_derivative(&owner, &child, &[parent.clone()], &[terms])
            .await
            .unwrap();

        let payer = ActorId::new("payer");
        protocol.credit(&payer, 1_000);
        protocol.pay_on_behalf(&payer, &child, 1_000).await.unwrap();

        let claimed = protocol
            .claim_revenue(&ActorId::new("anyone"), &parent, &child)
            .await
            .unwrap();
        assert_eq!(claimed, vec![100]);
        assert_eq!(protocol.vault_balance(&parent), 100);
        assert_eq!(protocol.vault_balance(&child), 900);

        // Second claim finds nothing.
        let again = protocol
            .claim_revenue(&ActorId::new("anyone"), &parent, &child)
            .await;
        assert!(matches!(again, Err(ProtocolError::NothingToClaim { .. })));
    }

    #[tokio::test]
    async fn derivative_links_register_once() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let parent = register_owned_asset(&access, &protocol, &owner, "parents").await;
        let child = register_owned_asset(&access, &protocol, &owner, "children").await;

        let template = TemplateId::new("pil");
        let terms_id = protocol
            .register_terms(&template, &LicenseTerms::non_commercial())
            .await
            .unwrap();
        let terms = TermsRef {
            template,
            terms_id,
        };
        protocol.attach_terms(&owner, &parent, &terms).await.unwrap();
        protocol
            .register_derivative(&owner, &child, &[parent.clone()], &[terms.clone()])
            .await
            .unwrap();

        let result = protocol
            .register_derivative(&owner, &child, &[parent], &[terms])
            .await;
        assert!(matches!(
            result,
            Err(ProtocolError::DerivativeAlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn group_rewards_distribute_in_member_order() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let first = register_owned_asset(&access, &protocol, &owner, "a").await;
        let second = register_owned_asset(&access, &protocol, &owner, "b").await;

        let pool = PoolId::new("pool-1");
        let group = protocol.register_group(&owner, &pool).await.unwrap();
        protocol
            .add_to_group(&owner, &group, &[first.clone(), second.clone()])
            .await
            .unwrap();
        protocol.fund_rewards(&pool, 100);

        let credited = protocol.collect_and_claim(&owner, &group).await.unwrap();
        assert_eq!(credited, vec![50, 50]);
        assert_eq!(protocol.vault_balance(&first), 50);
        assert_eq!(protocol.vault_balance(&second), 50);
    }

    #[tokio::test]
    async fn checkpoint_rollback_restores_state() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let asset = register_owned_asset(&access, &protocol, &owner, "art").await;

        let cp = protocol.checkpoint();
        let terms_id = protocol
            .register_terms(&TemplateId::new("pil"), &LicenseTerms::non_commercial())
            .await
            .unwrap();
        protocol
            .attach_terms(
                &owner,
                &asset,
                &TermsRef {
                    template: TemplateId::new("pil"),
                    terms_id,
                },
            )
            .await
            .unwrap();
        assert_eq!(protocol.attached_terms(&asset).len(), 1);

        protocol.rollback_to(cp);
        assert!(protocol.attached_terms(&asset).is_empty());
    }

    #[tokio::test]
    async fn deploy_vault_is_idempotent() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let asset = register_owned_asset(&access, &protocol, &owner, "art").await;

        let first = protocol.deploy_vault(&asset).await.unwrap();
        let second = protocol.deploy_vault(&asset).await.unwrap();
        assert_eq!(first, second);

        let missing = AssetId::derive(DomainId(9), &CollectionId::new("ghost"), ItemId(1));
        let result = protocol.deploy_vault(&missing).await;
        assert!(matches!(result, Err(ProtocolError::AssetNotFound(_))));
    }

    #[tokio::test]
    async fn metadata_set_and_get() {
        let (access, protocol) = setup();
        let owner = ActorId::new("owner");
        let asset = register_owned_asset(&access, &protocol, &owner, "art").await;

        let metadata = AssetMetadata {
            metadata_uri: "ipfs://meta".into(),
            metadata_hash: "0xabc".into(),
            item_metadata_uri: "ipfs://item".into(),
            item_metadata_hash: "0xdef".into(),
        };
        protocol.set_all(&owner, &asset, &metadata).await.unwrap();
        assert_eq!(protocol.get(&asset).await, Some(metadata));
    }
}
