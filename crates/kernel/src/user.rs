//! Account description used to provision an application user.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role granted by default to the application user.
pub const READ_WRITE_ROLE: &str = "readWrite";

/// Errors raised while building a [`UserSpec`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("role grant #{index} has an empty {field}")]
    EmptyRoleField { index: usize, field: &'static str },
}

/// A (role name, database name) pair conferring a permission scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }
}

impl fmt::Display for RoleGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.db)
    }
}

/// Everything needed to look up and, if missing, create one database user.
#[derive(Clone, PartialEq, Eq)]
pub struct UserSpec {
    database_name: String,
    user_name: String,
    password: String,
    roles: Vec<RoleGrant>,
}

impl UserSpec {
    /// Build a validated spec. Role order is preserved.
    pub fn new(
        database_name: impl Into<String>,
        user_name: impl Into<String>,
        password: impl Into<String>,
        roles: Vec<RoleGrant>,
    ) -> Result<Self, SpecError> {
        let spec = Self {
            database_name: database_name.into(),
            user_name: user_name.into(),
            password: password.into(),
            roles,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Spec granting `readWrite` on the user's own database.
    pub fn read_write(
        database_name: impl Into<String>,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, SpecError> {
        let database_name = database_name.into();
        let roles = vec![RoleGrant::new(READ_WRITE_ROLE, database_name.clone())];
        Self::new(database_name, user_name, password, roles)
    }

    fn validate(&self) -> Result<(), SpecError> {
        if self.database_name.trim().is_empty() {
            return Err(SpecError::Empty {
                field: "database name",
            });
        }
        if self.user_name.trim().is_empty() {
            return Err(SpecError::Empty { field: "user name" });
        }
        if self.password.is_empty() {
            return Err(SpecError::Empty { field: "password" });
        }
        for (index, grant) in self.roles.iter().enumerate() {
            if grant.role.trim().is_empty() {
                return Err(SpecError::EmptyRoleField {
                    index,
                    field: "role",
                });
            }
            if grant.db.trim().is_empty() {
                return Err(SpecError::EmptyRoleField {
                    index,
                    field: "database",
                });
            }
        }
        Ok(())
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn roles(&self) -> &[RoleGrant] {
        &self.roles
    }

    /// `user@database`, as shown in status lines.
    pub fn target(&self) -> String {
        format!("{}@{}", self.user_name, self.database_name)
    }
}

impl fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSpec")
            .field("database_name", &self.database_name)
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .field("roles", &self.roles)
            .finish()
    }
}

/// A user as reported by the database's user registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user: String,
    pub db: String,
    pub roles: Vec<RoleGrant>,
}
