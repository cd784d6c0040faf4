//! Composite workflow orchestrators for the Quill periphery.
//!
//! Every public entry point runs three ordered phases inside one unit of
//! work:
//!
//! 1. **Authorize** — verify the supplied permission tickets and install the
//!    grants the Act phase needs; a no-op when the caller already owns the
//!    accounts involved.
//! 2. **Act** — the domain calls against the core-protocol collaborators,
//!    relying on the phase-1 grants.
//! 3. **Finalize** — commit the unit (transient grants die at this boundary)
//!    and return the composite receipt.
//!
//! A failure in any phase rolls the whole call back: the grant set, account
//! states and collaborator state all return to their pre-call values, and the
//! original error crosses the boundary unchanged.

#![deny(unsafe_code)]

pub mod batch;
pub mod config;
pub mod derivative;
pub mod error;
pub mod grouping;
pub mod license;
pub mod receipts;
pub mod registration;
pub mod royalty;
pub mod service;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::WorkflowCall;
pub use config::WorkflowsConfig;
pub use error::WorkflowError;
pub use receipts::{
    ClaimReceipt, ClaimedRevenue, DistributionReceipt, GroupReceipt, LicenseTokensReceipt,
    PaymentReceipt, RegistrationReceipt, TermsReceipt, WorkflowReceipt,
};
pub use service::{AccessRestricted, BatchCallable, Services, Upgradeable, WorkflowService};
