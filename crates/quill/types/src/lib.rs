//! Core type definitions for the Quill periphery.
//!
//! This crate provides the shared identifier newtypes, the account state
//! chain, and the payload structs carried by workflow call signatures.

#![deny(unsafe_code)]

pub mod ids;
pub mod payloads;
pub mod state;

// Re-export primary types at crate root for ergonomic use.
pub use ids::{
    AccountId, ActorId, AssetId, CollectionId, DomainId, GroupId, ItemId, LicenseTokenId,
    ModuleId, PoolId, Selector, TemplateId, TermsId, VaultId,
};
pub use payloads::{
    AssetMetadata, DerivativeSpec, LicenseTerms, LicensingConfig, TermsAttachment, TermsRef,
};
pub use state::AccountState;
