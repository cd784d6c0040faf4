//! Shared fixtures for workflow tests.

use std::sync::Arc;

use quill_access::AccessController;
use quill_crypto::Keypair;
use quill_protocol::{ItemMinter, MemoryProtocol};
use quill_types::{ActorId, AssetMetadata, CollectionId};

use crate::config::WorkflowsConfig;
use crate::service::{Services, WorkflowService};

pub(crate) struct Harness {
    pub access: Arc<AccessController>,
    pub protocol: Arc<MemoryProtocol>,
    pub service: WorkflowService,
    pub operator: ActorId,
}

impl Harness {
    pub fn periphery(&self) -> ActorId {
        self.service.identity().clone()
    }
}

pub(crate) fn harness() -> Harness {
    let access = Arc::new(AccessController::new());
    let protocol = Arc::new(MemoryProtocol::new(access.clone()));
    let operator = ActorId::new("operator");

    let services = Services {
        minter: protocol.clone(),
        registry: protocol.clone(),
        licensing: protocol.clone(),
        royalty: protocol.clone(),
        grouping: protocol.clone(),
        metadata: protocol.clone(),
        journal: protocol.clone(),
    };
    let service = WorkflowService::new(
        ActorId::new("quill-periphery"),
        operator.clone(),
        WorkflowsConfig::default(),
        access.clone(),
        services,
    );

    Harness {
        access,
        protocol,
        service,
        operator,
    }
}

/// A user with a signing key, plus a collection they can mint from.
pub(crate) async fn user_with_collection(h: &Harness, name: &str) -> (Keypair, CollectionId) {
    let user = Keypair::generate();
    let collection = h
        .protocol
        .create_collection(&user.actor_id(), name)
        .await
        .expect("create collection");
    (user, collection)
}

pub(crate) fn metadata(tag: &str) -> AssetMetadata {
    AssetMetadata {
        metadata_uri: format!("ipfs://{tag}"),
        metadata_hash: format!("hash-{tag}"),
        item_metadata_uri: format!("ipfs://{tag}-item"),
        item_metadata_hash: format!("hash-{tag}-item"),
    }
}
