//! Access control for the Quill periphery.
//!
//! The [`AccessController`] owns every account record and its permission
//! grants. All mutations flow through a [`UnitOfWork`]: an undo journal that
//! makes a composite operation atomic, and the boundary at which transient
//! grants are structurally cleared. The [`PermissionGrantor`] turns verified
//! permission tickets into installed grants.

#![deny(unsafe_code)]

pub mod controller;
pub mod grantor;
pub mod unit;

pub use controller::{AccessController, AccessError, AccountRecord, GrantKey};
pub use grantor::{GrantError, PermissionGrantor};
pub use unit::UnitOfWork;
