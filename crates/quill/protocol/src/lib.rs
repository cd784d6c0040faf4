//! Core-protocol collaborator interfaces for the Quill periphery.
//!
//! The periphery never implements registry, licensing, royalty or grouping
//! logic itself — it coordinates calls against these interfaces. The traits
//! here mirror the call contract the deployed core exposes; the in-memory
//! implementation exists so the orchestration layer can be exercised
//! end-to-end.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod surface;
pub mod traits;

pub use error::ProtocolError;
pub use memory::MemoryProtocol;
pub use traits::{
    AssetRegistry, CheckpointId, Grouping, ItemMinter, Licensing, MetadataStore, ProtocolJournal,
    Royalty,
};
