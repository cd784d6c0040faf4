//! Well-known module and selector names of the core protocol.
//!
//! Permission grants are keyed by these pairs; tickets authorizing a workflow
//! must request exactly the pairs the workflow's Act phase will touch.

use quill_types::{ModuleId, Selector};

pub mod modules {
    use super::*;

    pub fn registry() -> ModuleId {
        ModuleId::new("registry")
    }

    pub fn licensing() -> ModuleId {
        ModuleId::new("licensing")
    }

    pub fn royalty() -> ModuleId {
        ModuleId::new("royalty")
    }

    pub fn grouping() -> ModuleId {
        ModuleId::new("grouping")
    }

    pub fn metadata() -> ModuleId {
        ModuleId::new("metadata")
    }
}

pub mod selectors {
    use super::*;

    pub fn attach_terms() -> Selector {
        Selector::new("attach_terms")
    }

    pub fn set_licensing_config() -> Selector {
        Selector::new("set_licensing_config")
    }

    pub fn mint_license_tokens() -> Selector {
        Selector::new("mint_license_tokens")
    }

    pub fn register_derivative() -> Selector {
        Selector::new("register_derivative")
    }

    pub fn set_all() -> Selector {
        Selector::new("set_all")
    }

    pub fn add_to_group() -> Selector {
        Selector::new("add_to_group")
    }
}
