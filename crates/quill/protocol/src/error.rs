use thiserror::Error;

use quill_access::AccessError;
use quill_types::{
    AccountId, ActorId, AssetId, CollectionId, GroupId, ItemId, ModuleId, Selector, TermsId,
};

/// Failures signaled by the core-protocol collaborators.
///
/// These cross the workflow boundary unchanged: the periphery never wraps or
/// remaps them, so callers can tell an orchestration failure from a domain
/// failure. Each condition is its own variant.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("collection {0} already exists")]
    CollectionExists(CollectionId),

    #[error("collection {0} does not exist")]
    CollectionNotFound(CollectionId),

    #[error("item {item} does not exist in collection {collection}")]
    ItemNotFound { collection: CollectionId, item: ItemId },

    #[error("{caller} does not hold item {item} of collection {collection}")]
    NotItemHolder {
        caller: ActorId,
        collection: CollectionId,
        item: ItemId,
    },

    #[error("asset {0} is already registered")]
    AlreadyRegistered(AssetId),

    #[error("asset {0} is not registered")]
    AssetNotFound(AssetId),

    #[error("license terms {0} are not registered")]
    TermsNotFound(TermsId),

    #[error("license terms {terms} are not attached to asset {asset}")]
    TermsNotAttached { asset: AssetId, terms: TermsId },

    #[error("licensing of terms {terms} on asset {asset} is disabled")]
    LicensingDisabled { asset: AssetId, terms: TermsId },

    #[error("asset {0} already has registered parents")]
    DerivativeAlreadyRegistered(AssetId),

    #[error("group {0} does not exist")]
    GroupNotFound(GroupId),

    #[error("nothing to claim from {child}")]
    NothingToClaim { child: AssetId },

    #[error("insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("{caller} lacks permission for {module}/{selector} on account {account}")]
    PermissionDenied {
        account: AccountId,
        caller: ActorId,
        module: ModuleId,
        selector: Selector,
    },

    #[error(transparent)]
    Access(#[from] AccessError),
}
