// Authentication collaborators used by USER and PASS
pub mod error;
pub mod helper;
pub mod passwd;

pub use error::AuthError;
pub use passwd::PasswdAuthenticator;

/// What USER should answer for a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCheck {
    NeedPassword,
    /// Accepted; any password (conventionally an e-mail address) will do.
    Anonymous,
    Rejected,
}

pub trait Authenticator: Send + Sync {
    fn check_user(&self, username: &str) -> UserCheck;

    fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError>;
}
