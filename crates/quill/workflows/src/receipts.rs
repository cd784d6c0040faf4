use serde::{Deserialize, Serialize};

use quill_types::{AssetId, GroupId, ItemId, LicenseTokenId, TermsId};

/// Result of a registration workflow: the new asset, the item backing it,
/// and any terms attached along the way (in attachment order).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub asset: AssetId,
    pub item: ItemId,
    pub terms: Vec<TermsId>,
}

/// Result of attaching license terms to an existing asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsReceipt {
    pub asset: AssetId,
    pub terms: Vec<TermsId>,
}

/// Result of a license-token mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseTokensReceipt {
    pub asset: AssetId,
    pub tokens: Vec<LicenseTokenId>,
}

/// Result of a group registration, with the members added (in input order).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReceipt {
    pub group: GroupId,
    pub added: Vec<AssetId>,
}

/// Result of collecting a group's reward pool into member vaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReceipt {
    pub group: GroupId,
    /// Amount credited per member, in member order.
    pub amounts: Vec<u64>,
}

/// One effective claim in a bulk revenue claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedRevenue {
    pub source: AssetId,
    pub amounts: Vec<u64>,
}

/// Result of a bulk revenue claim: effective transfers in child order, plus
/// the children skipped because they had nothing claimable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub ancestor: AssetId,
    pub claims: Vec<ClaimedRevenue>,
    pub skipped: Vec<AssetId>,
}

/// Result of a royalty payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub receiver: AssetId,
    pub amount: u64,
}

/// Receipt of one call inside a batch. Variants mirror the entry points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowReceipt {
    Registration(RegistrationReceipt),
    Terms(TermsReceipt),
    LicenseTokens(LicenseTokensReceipt),
    Group(GroupReceipt),
    Distribution(DistributionReceipt),
    Claim(ClaimReceipt),
    Payment(PaymentReceipt),
}
