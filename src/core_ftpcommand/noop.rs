use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;

pub async fn handle_noop_command(_request: CommandRequest) -> HandlerResult {
    Ok(Some(Response::new(200, "NOOP ok.")))
}
