use crate::core_ftpcommand::handler::{CommandRequest, HandlerError, HandlerResult};
use crate::core_ftpcommand::response::Response;
use log::{info, warn};

/// Handles the PASS FTP command.
///
/// Verifies the password for the user named by the preceding USER. Hash
/// verification is CPU heavy, so it runs on the blocking pool.
pub async fn handle_pass_command(request: CommandRequest) -> HandlerResult {
    let CommandRequest { command, ctx, .. } = request;

    let Some(username) = ctx.session.lock().await.username.clone() else {
        return Ok(Some(Response::new(503, "Login with USER first.")));
    };

    let authenticator = ctx.server.authenticator.clone();
    let password = command.argument;
    let user = username.clone();
    let verified = tokio::task::spawn_blocking(move || authenticator.authenticate(&user, &password))
        .await
        .map_err(|e| HandlerError::Other(e.into()))?;

    match verified {
        Ok(()) => {
            info!("[{}] User {} logged in", ctx.control_peer, username);
            Ok(Some(Response::new(230, "User logged in, proceed.")))
        }
        Err(e) => {
            warn!("[{}] Login failed: {}", ctx.control_peer, e);
            ctx.session.lock().await.username = None;
            Ok(Some(Response::new(530, "Not logged in.")))
        }
    }
}
