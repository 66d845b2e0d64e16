use crate::constants::USERNAME_REGEX;
use crate::core_auth::UserCheck;
use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;
use log::{info, warn};
use regex::Regex;
use std::sync::OnceLock;

fn is_valid_username(username: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(USERNAME_REGEX).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(username))
}

/// Handles the USER FTP command.
///
/// Remembers the name for PASS and answers `331` (password needed, or an
/// anonymous login), `501` for a name that is not acceptable syntax, or `530`
/// when the authenticator refuses the user outright.
pub async fn handle_user_command(request: CommandRequest) -> HandlerResult {
    let CommandRequest { command, ctx, .. } = request;
    let username = command.argument.trim();

    if !is_valid_username(username) {
        warn!("[{}] Rejected malformed user name", ctx.control_peer);
        return Ok(Some(Response::new(501, "Syntax error in parameters or arguments.")));
    }

    let check = ctx.server.authenticator.check_user(username);
    let response = match check {
        UserCheck::Rejected => {
            info!("[{}] User {} refused", ctx.control_peer, username);
            return Ok(Some(Response::new(530, "Not logged in.")));
        }
        UserCheck::Anonymous => {
            info!("[{}] Anonymous login initiated for {}", ctx.control_peer, username);
            Response::new(
                331,
                "Anonymous login okay, send your complete email address as password.",
            )
        }
        UserCheck::NeedPassword => {
            info!("[{}] Username accepted: {}", ctx.control_peer, username);
            Response::new(331, "User name okay, need password.")
        }
    };

    ctx.session.lock().await.username = Some(username.to_string());
    Ok(Some(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_syntax() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("bob.smith@example.com"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("bad name"));
        assert!(!is_valid_username(&"x".repeat(65)));
    }
}
