use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use provision_kernel::{RoleGrant, UserInfo, UserSpec};

use crate::{RegistryError, UserDatabase};

#[derive(Debug, Clone)]
struct StoredUser {
    password: String,
    roles: Vec<RoleGrant>,
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<String, StoredUser>,
    lookups: usize,
    creates: usize,
    fail_next_lookup: Option<String>,
    fail_next_create: Option<String>,
}

/// In-process user registry for a single database.
///
/// Every call is counted, including failed ones, so callers can assert how many
/// lookups and mutations were issued. Failures can be injected for the next
/// lookup or create.
#[derive(Debug)]
pub struct MemoryDatabase {
    name: String,
    state: Mutex<State>,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Seed an existing user without counting it as a create.
    pub fn with_user(self, spec: &UserSpec) -> Self {
        self.state.lock().users.insert(
            spec.user_name().to_string(),
            StoredUser {
                password: spec.password().to_string(),
                roles: spec.roles().to_vec(),
            },
        );
        self
    }

    pub fn fail_next_lookup(&self, message: impl Into<String>) {
        self.state.lock().fail_next_lookup = Some(message.into());
    }

    pub fn fail_next_create(&self, message: impl Into<String>) {
        self.state.lock().fail_next_create = Some(message.into());
    }

    pub fn lookup_count(&self) -> usize {
        self.state.lock().lookups
    }

    pub fn create_count(&self) -> usize {
        self.state.lock().creates
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }

    pub fn password_of(&self, user: &str) -> Option<String> {
        self.state
            .lock()
            .users
            .get(user)
            .map(|stored| stored.password.clone())
    }

    fn info(&self, user: &str, stored: &StoredUser) -> UserInfo {
        UserInfo {
            user: user.to_string(),
            db: self.name.clone(),
            roles: stored.roles.clone(),
        }
    }
}

#[async_trait]
impl UserDatabase for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_user(&self, user: &str) -> Result<Option<UserInfo>, RegistryError> {
        let mut state = self.state.lock();
        state.lookups += 1;

        if let Some(message) = state.fail_next_lookup.take() {
            return Err(RegistryError::Injected(message));
        }

        Ok(state.users.get(user).map(|stored| self.info(user, stored)))
    }

    async fn create_user(&self, spec: &UserSpec) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        state.creates += 1;

        if let Some(message) = state.fail_next_create.take() {
            return Err(RegistryError::Injected(message));
        }

        if state.users.contains_key(spec.user_name()) {
            return Err(RegistryError::UserExists {
                user: spec.user_name().to_string(),
                db: self.name.clone(),
            });
        }

        state.users.insert(
            spec.user_name().to_string(),
            StoredUser {
                password: spec.password().to_string(),
                roles: spec.roles().to_vec(),
            },
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> UserSpec {
        UserSpec::read_write("mongo", "app_user", "verystrongpassword").unwrap()
    }

    #[tokio::test]
    async fn created_user_is_visible_to_lookup() {
        let db = MemoryDatabase::new("mongo");
        assert_eq!(db.get_user("app_user").await.unwrap(), None);

        db.create_user(&spec()).await.unwrap();

        let found = db.get_user("app_user").await.unwrap().unwrap();
        assert_eq!(found.db, "mongo");
        assert_eq!(found.roles, vec![RoleGrant::new("readWrite", "mongo")]);
        assert_eq!(db.password_of("app_user").as_deref(), Some("verystrongpassword"));
        assert_eq!(db.lookup_count(), 2);
        assert_eq!(db.create_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let db = MemoryDatabase::new("mongo").with_user(&spec());

        let err = db.create_user(&spec()).await.unwrap_err();
        assert!(matches!(err, RegistryError::UserExists { .. }));
        assert_eq!(err.to_string(), "user app_user@mongo already exists");
        assert_eq!(db.user_count(), 1);
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let db = MemoryDatabase::new("mongo");
        db.fail_next_lookup("connection reset");

        let err = db.get_user("app_user").await.unwrap_err();
        assert_eq!(err.to_string(), "injected failure: connection reset");
        assert_eq!(db.get_user("app_user").await.unwrap(), None);
    }
}
