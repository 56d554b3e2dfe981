use std::fmt;

use anyhow::Context;
use provision_db::{RegistryError, UserDatabase};
use provision_kernel::{Settings, UserInfo, UserSpec};

/// Terminal state of [`ensure_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created { target: String },
    AlreadyExists { target: String },
}

impl EnsureOutcome {
    pub fn target(&self) -> &str {
        match self {
            Self::Created { target } | Self::AlreadyExists { target } => target,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

impl fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created { target } => write!(f, "User {target} created"),
            Self::AlreadyExists { target } => write!(f, "User {target} already exists, skipping"),
        }
    }
}

/// Create the user described by `spec` unless it already exists.
///
/// Issues at most one mutating call. Lookup and create errors are returned as-is;
/// a concurrent run that wins the race surfaces as [`RegistryError::UserExists`].
pub async fn ensure_user<D>(db: &D, spec: &UserSpec) -> Result<EnsureOutcome, RegistryError>
where
    D: UserDatabase + ?Sized,
{
    let target = spec.target();

    if db.get_user(spec.user_name()).await?.is_some() {
        tracing::info!(target_user = %target, "user already present");
        return Ok(EnsureOutcome::AlreadyExists { target });
    }

    tracing::info!(
        target_user = %target,
        roles = spec.roles().len(),
        "creating user"
    );
    db.create_user(spec).await?;

    Ok(EnsureOutcome::Created { target })
}

/// Read-only lookup of the user described by `spec`.
pub async fn check_user<D>(db: &D, spec: &UserSpec) -> Result<Option<UserInfo>, RegistryError>
where
    D: UserDatabase + ?Sized,
{
    db.get_user(spec.user_name()).await
}

/// Connect with `settings` and ensure the configured application user exists.
pub async fn provision(settings: &Settings) -> anyhow::Result<EnsureOutcome> {
    let spec = settings
        .app_user
        .user_spec()
        .with_context(|| "invalid application user settings")?;

    let db = provision_db::connect(&settings.mongo, spec.database_name())
        .await
        .with_context(|| format!("failed to connect to {}", settings.mongo.redacted_uri()))?;

    ensure_user(&db, &spec)
        .await
        .with_context(|| format!("failed to ensure user {}", spec.target()))
}
