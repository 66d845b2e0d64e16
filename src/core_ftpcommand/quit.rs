use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;
use log::info;

/// Handles the QUIT FTP command. The driver closes the connection once the
/// reply has been written.
pub async fn handle_quit_command(request: CommandRequest) -> HandlerResult {
    info!("[{}] Received QUIT command. Closing connection.", request.ctx.control_peer);
    Ok(Some(Response::new(221, "Service closing control connection.")))
}
