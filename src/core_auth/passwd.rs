use crate::core_auth::error::AuthError;
use crate::core_auth::helper::verify_password;
use crate::core_auth::{Authenticator, UserCheck};
use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;

const ANONYMOUS_USERS: [&str; 2] = ["anonymous", "ftp"];

#[derive(Debug, Clone)]
pub struct PasswdEntry {
    username: String,
    hashed_password: String,
}

impl PasswdEntry {
    /// Parses `user:bcrypt-hash`. The hash itself may not contain `:`.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (username, hashed_password) = line.split_once(':')?;
        if username.is_empty() || hashed_password.is_empty() || hashed_password.contains(':') {
            return None;
        }
        Some(PasswdEntry {
            username: username.to_string(),
            hashed_password: hashed_password.to_string(),
        })
    }

    pub fn get_hashed_password(&self) -> &str {
        &self.hashed_password
    }

    pub fn get_username(&self) -> &str {
        &self.username
    }
}

/// Users from a passwd-style file, optionally plus anonymous access.
#[derive(Debug, Default)]
pub struct PasswdAuthenticator {
    entries: HashMap<String, PasswdEntry>,
    anonymous: bool,
}

impl PasswdAuthenticator {
    pub fn new(entries: Vec<PasswdEntry>, anonymous: bool) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.get_username().to_string(), e))
                .collect(),
            anonymous,
        }
    }

    pub fn anonymous_only() -> Self {
        Self::new(Vec::new(), true)
    }

    pub fn parse(content: &str, anonymous: bool) -> Self {
        let entries = content
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                let entry = PasswdEntry::from_line(line);
                if entry.is_none() && !line.trim().is_empty() && !line.trim().starts_with('#') {
                    warn!("Ignoring malformed passwd line {}", i + 1);
                }
                entry
            })
            .collect();
        Self::new(entries, anonymous)
    }

    pub fn load(path: &Path, anonymous: bool) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AuthError::PasswdReadError(format!("{}: {}", path.display(), e)))?;
        let auth = Self::parse(&content, anonymous);
        info!("Loaded {} users from {}", auth.entries.len(), path.display());
        Ok(auth)
    }

    fn is_anonymous(&self, username: &str) -> bool {
        self.anonymous
            && ANONYMOUS_USERS
                .iter()
                .any(|a| a.eq_ignore_ascii_case(username))
    }
}

impl Authenticator for PasswdAuthenticator {
    fn check_user(&self, username: &str) -> UserCheck {
        if self.is_anonymous(username) {
            UserCheck::Anonymous
        } else {
            // Unknown users are asked for a password too, so names cannot be probed.
            UserCheck::NeedPassword
        }
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if self.is_anonymous(username) {
            return Ok(());
        }
        match self.entries.get(username) {
            Some(entry) if verify_password(password, entry.get_hashed_password()) => Ok(()),
            Some(_) => Err(AuthError::InvalidCredentials(username.to_string())),
            None => Err(AuthError::UnknownUser(username.to_string())),
        }
    }
}
