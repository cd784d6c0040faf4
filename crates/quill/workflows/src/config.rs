use serde::{Deserialize, Serialize};

use quill_types::DomainId;

/// Configuration for the workflow service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowsConfig {
    /// Registration domain every asset is registered under.
    pub domain: DomainId,
    /// Upper bound on calls per batch (default: 32).
    pub max_batch_calls: usize,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            domain: DomainId(1),
            max_batch_calls: 32,
        }
    }
}
