use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;

const COMMANDS_PER_LINE: usize = 8;

/// Handles the HELP FTP command with a `214` listing of the known commands.
///
/// Lines are produced while the reply is written.
pub async fn handle_help_command(request: CommandRequest) -> HandlerResult {
    let names = request.ctx.server.handlers.names();
    let rows: Vec<Vec<String>> = names
        .chunks(COMMANDS_PER_LINE)
        .map(|chunk| chunk.to_vec())
        .collect();

    let lines = std::iter::once(String::from("The following commands are recognized:"))
        .chain(rows.into_iter().map(|row| {
            row.iter()
                .map(|name| format!("{:<5}", name))
                .collect::<Vec<_>>()
                .join(" ")
        }))
        .chain(std::iter::once(String::from("Help OK.")));

    Ok(Some(Response::lazy(214, lines)))
}
