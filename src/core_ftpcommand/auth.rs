use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;
use log::info;

/// Handles the AUTH FTP command. No security mechanism is available, so every
/// request is refused and the security machine stays where it is.
pub async fn handle_auth_command(request: CommandRequest) -> HandlerResult {
    info!(
        "[{}] AUTH {} refused, no security mechanism configured",
        request.ctx.control_peer, request.command.argument
    );
    Ok(Some(Response::new(534, "Request denied for policy reasons.")))
}
