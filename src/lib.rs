//! Application-user provisioning.
//!
//! Ensures a single database user exists, creating it only when the registry
//! has no user of that name.

pub mod initializer;

pub use initializer::{check_user, ensure_user, provision, EnsureOutcome};
