use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;

/// Handles the SYST (System) FTP command.
pub async fn handle_syst_command(_request: CommandRequest) -> HandlerResult {
    Ok(Some(Response::new(215, "UNIX Type: L8")))
}
