use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use provision_kernel::settings::MongoSettings;
use provision_kernel::{RoleGrant, UserInfo, UserSpec};
use serde::Deserialize;

use crate::{RegistryError, UserDatabase};

const APP_NAME: &str = "provision-app";

// Server error codes.
const UNAUTHORIZED: i32 = 13;
const USER_ALREADY_EXISTS: i32 = 51003;

/// Connect using `settings` and bind a handle to `database`.
///
/// The server is pinged once so that unreachable hosts and bad credentials fail
/// here instead of at the first lookup.
pub async fn connect(
    settings: &MongoSettings,
    database: &str,
) -> Result<MongoDatabase, RegistryError> {
    tracing::debug!(uri = %settings.redacted_uri(), "setting up mongo client");

    let mut options = ClientOptions::parse(settings.connection_uri()).await?;
    options.app_name = Some(APP_NAME.to_string());
    options.server_selection_timeout = Some(settings.server_selection_timeout());
    options.connect_timeout = Some(settings.connect_timeout());

    let client = Client::with_options(options)?;

    let deadline = settings.server_selection_timeout() + settings.connect_timeout();
    tokio::time::timeout(
        deadline,
        client.database(ping_database(settings)).run_command(doc! { "ping": 1 }, None),
    )
    .await
    .map_err(|_| RegistryError::Timeout("mongo ping"))??;

    tracing::debug!(database, "mongo client ready");

    Ok(MongoDatabase::new(client.database(database)))
}

/// Database the connection check runs against; the one credentials are verified in.
fn ping_database(settings: &MongoSettings) -> &str {
    &settings.auth_db
}

/// User registry of one MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoDatabase {
    database: Database,
}

impl MongoDatabase {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl UserDatabase for MongoDatabase {
    fn name(&self) -> &str {
        self.database.name()
    }

    async fn get_user(&self, user: &str) -> Result<Option<UserInfo>, RegistryError> {
        let reply = self
            .database
            .run_command(doc! { "usersInfo": user }, None)
            .await
            .map_err(|err| classify(err, user, self.name()))?;

        parse_users_info(reply)
    }

    async fn create_user(&self, spec: &UserSpec) -> Result<(), RegistryError> {
        self.database
            .run_command(create_user_command(spec), None)
            .await
            .map_err(|err| classify(err, spec.user_name(), self.name()))?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UsersInfoReply {
    users: Vec<RegisteredUser>,
}

#[derive(Debug, Deserialize)]
struct RegisteredUser {
    user: String,
    db: String,
    #[serde(default)]
    roles: Vec<RoleGrant>,
}

fn parse_users_info(reply: Document) -> Result<Option<UserInfo>, RegistryError> {
    let reply: UsersInfoReply = bson::from_document(reply)
        .map_err(|err| RegistryError::MalformedResponse(err.to_string()))?;

    Ok(reply.users.into_iter().next().map(|found| UserInfo {
        user: found.user,
        db: found.db,
        roles: found.roles,
    }))
}

fn create_user_command(spec: &UserSpec) -> Document {
    let roles: Vec<Bson> = spec
        .roles()
        .iter()
        .map(|grant| {
            Bson::Document(doc! {
                "role": grant.role.as_str(),
                "db": grant.db.as_str(),
            })
        })
        .collect();

    doc! {
        "createUser": spec.user_name(),
        "pwd": spec.password(),
        "roles": roles,
    }
}

fn classify(err: mongodb::error::Error, user: &str, db: &str) -> RegistryError {
    let command = match err.kind.as_ref() {
        ErrorKind::Command(command) => Some((command.code, command.message.clone())),
        _ => None,
    };

    match command {
        Some((USER_ALREADY_EXISTS, _)) => RegistryError::UserExists {
            user: user.to_string(),
            db: db.to_string(),
        },
        Some((UNAUTHORIZED, message)) => RegistryError::Unauthorized { message },
        _ => RegistryError::Driver(err),
    }
}

#[cfg(test)]
mod tests {
    use mongodb::error::CommandError;

    use super::*;

    fn command_error(code: i32, message: &str) -> mongodb::error::Error {
        let command: CommandError = bson::from_document(doc! {
            "code": code,
            "codeName": "TestError",
            "errmsg": message,
        })
        .unwrap();
        mongodb::error::Error::from(ErrorKind::Command(command))
    }

    #[test]
    fn duplicate_user_code_maps_to_user_exists() {
        let err = classify(command_error(51003, "User already exists"), "app_user", "mongo");
        match err {
            RegistryError::UserExists { user, db } => {
                assert_eq!(user, "app_user");
                assert_eq!(db, "mongo");
            }
            other => panic!("expected UserExists, got {other:?}"),
        }
    }

    #[test]
    fn unauthorized_code_keeps_server_message() {
        let err = classify(command_error(13, "not authorized on mongo"), "app_user", "mongo");
        match err {
            RegistryError::Unauthorized { message } => {
                assert_eq!(message, "not authorized on mongo")
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn other_codes_stay_driver_errors() {
        let err = classify(command_error(2, "bad value"), "app_user", "mongo");
        assert!(matches!(err, RegistryError::Driver(_)));
    }

    #[test]
    fn ping_runs_against_configured_auth_db() {
        let settings = MongoSettings {
            auth_db: "ops".to_string(),
            ..MongoSettings::default()
        };
        assert_eq!(ping_database(&settings), "ops");
        assert_eq!(ping_database(&MongoSettings::default()), "admin");
    }

    #[test]
    fn empty_users_info_means_absent() {
        let reply = doc! { "users": [], "ok": 1.0 };
        assert_eq!(parse_users_info(reply).unwrap(), None);
    }

    #[test]
    fn users_info_reply_is_parsed() {
        let reply = doc! {
            "users": [{
                "_id": "mongo.app_user",
                "userId": "00000000-0000-0000-0000-000000000000",
                "user": "app_user",
                "db": "mongo",
                "roles": [{ "role": "readWrite", "db": "mongo" }],
                "mechanisms": ["SCRAM-SHA-1", "SCRAM-SHA-256"],
            }],
            "ok": 1.0,
        };

        let found = parse_users_info(reply).unwrap().unwrap();
        assert_eq!(found.user, "app_user");
        assert_eq!(found.db, "mongo");
        assert_eq!(found.roles, vec![RoleGrant::new("readWrite", "mongo")]);
    }

    #[test]
    fn reply_without_users_is_malformed() {
        let err = parse_users_info(doc! { "ok": 1.0 }).unwrap_err();
        assert!(matches!(err, RegistryError::MalformedResponse(_)));
    }

    #[test]
    fn create_user_command_carries_spec() {
        let spec = UserSpec::new(
            "mongo",
            "app_user",
            "verystrongpassword",
            vec![
                RoleGrant::new("readWrite", "mongo"),
                RoleGrant::new("read", "reporting"),
            ],
        )
        .unwrap();

        let command = create_user_command(&spec);
        assert_eq!(
            command,
            doc! {
                "createUser": "app_user",
                "pwd": "verystrongpassword",
                "roles": [
                    { "role": "readWrite", "db": "mongo" },
                    { "role": "read", "db": "reporting" },
                ],
            }
        );
        // The command name must be the first key.
        assert_eq!(command.keys().next().map(String::as_str), Some("createUser"));
    }
}
