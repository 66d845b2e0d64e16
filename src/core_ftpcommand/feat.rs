use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;

/// Handles the FEAT (Feature) FTP command.
///
/// Lists the features advertised by the registered handlers, one per line.
pub async fn handle_feat_command(request: CommandRequest) -> HandlerResult {
    let mut lines = vec![String::from("Features:")];
    lines.extend(request.ctx.server.handlers.features());
    lines.push(String::from("End"));
    Ok(Some(Response::lines(211, lines)))
}
