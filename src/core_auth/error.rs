use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials for user {0}")]
    InvalidCredentials(String),

    #[error("Unknown user {0}")]
    UnknownUser(String),

    #[error("Failed to read passwd file: {0}")]
    PasswdReadError(String),

    #[error("Failed to hash password: {0}")]
    HashError(String),
}
