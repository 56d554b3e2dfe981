use thiserror::Error;

/// Failures surfaced by a [`crate::UserDatabase`].
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("user {user}@{db} already exists")]
    UserExists { user: String, db: String },

    #[error("not authorized: {message}")]
    Unauthorized { message: String },

    #[error("malformed usersInfo reply: {0}")]
    MalformedResponse(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("injected failure: {0}")]
    Injected(String),

    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),
}
