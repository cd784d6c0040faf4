use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssetId, TemplateId, TermsId};

/// Metadata attached to a registered asset.
///
/// Hashes are carried as opaque hex strings; the periphery stores and
/// forwards them without interpretation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub metadata_uri: String,
    pub metadata_hash: String,
    pub item_metadata_uri: String,
    pub item_metadata_hash: String,
}

/// Structured license terms payload.
///
/// Content-addressed by the licensing collaborator: registering an identical
/// payload twice resolves to the same `TermsId`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseTerms {
    pub commercial_use: bool,
    pub derivatives_allowed: bool,
    pub royalty_share_bps: u16,
    pub transferable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

impl LicenseTerms {
    /// Permissive non-commercial defaults.
    pub fn non_commercial() -> Self {
        Self {
            commercial_use: false,
            derivatives_allowed: true,
            royalty_share_bps: 0,
            transferable: true,
            expiration: None,
        }
    }

    /// Commercial terms with a revenue share.
    pub fn commercial(royalty_share_bps: u16) -> Self {
        Self {
            commercial_use: true,
            derivatives_allowed: true,
            royalty_share_bps,
            transferable: true,
            expiration: None,
        }
    }
}

/// Per-attachment licensing configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensingConfig {
    pub minting_fee: u64,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_data: Option<String>,
}

/// Terms plus their configuration, as submitted to attachment workflows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsAttachment {
    pub template: TemplateId,
    pub terms: LicenseTerms,
    pub config: LicensingConfig,
}

/// Reference to already-registered terms.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermsRef {
    pub template: TemplateId,
    pub terms_id: TermsId,
}

/// Parent linkage for a derivative registration.
///
/// `parents` and `terms` are parallel lists: `terms[i]` is the license the
/// derivative takes from `parents[i]`. Order is significant — it fixes the
/// result indices returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeSpec {
    pub parents: Vec<AssetId>,
    pub terms: Vec<TermsRef>,
}
