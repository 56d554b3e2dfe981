//! Handles onto a single database's user registry.
//!
//! [`UserDatabase`] is the seam the initializer works against. [`MongoDatabase`]
//! talks to a real server, [`MemoryDatabase`] keeps users in process.

mod error;
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use provision_kernel::{UserInfo, UserSpec};

pub use error::RegistryError;
pub use memory::MemoryDatabase;
pub use mongo::{connect, MongoDatabase};

/// A handle bound to one database and its user registry.
#[async_trait]
pub trait UserDatabase: Send + Sync {
    /// Name of the database this handle is bound to.
    fn name(&self) -> &str;

    /// Look up a user by name. `Ok(None)` means the user does not exist.
    async fn get_user(&self, user: &str) -> Result<Option<UserInfo>, RegistryError>;

    /// Create the user described by `spec`. Fails if the user already exists.
    async fn create_user(&self, spec: &UserSpec) -> Result<(), RegistryError>;
}
