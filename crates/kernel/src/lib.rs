//! Settings and account types shared by the provisioning crates.

pub mod settings;
pub mod user;

pub use settings::Settings;
pub use user::{RoleGrant, SpecError, UserInfo, UserSpec};
