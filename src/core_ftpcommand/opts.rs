use crate::core_ftpcommand::encoding::TextEncoding;
use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;
use log::debug;

/// Handles the OPTS FTP command. Only `OPTS UTF8 ON|OFF` is understood; it
/// switches the control channel encoding between UTF-8 and Latin-1.
pub async fn handle_opts_command(request: CommandRequest) -> HandlerResult {
    let CommandRequest { command, ctx, .. } = request;
    let mut parts = command.argument.split_whitespace();
    let option = parts.next().map(str::to_ascii_uppercase);
    let value = parts.next().map(str::to_ascii_uppercase);

    let response = match (option.as_deref(), value.as_deref()) {
        (Some("UTF8"), Some("ON") | None) => {
            ctx.session.lock().await.encoding = TextEncoding::Utf8;
            debug!("[{}] UTF-8 enabled", ctx.control_peer);
            Response::new(200, "UTF8 mode enabled.")
        }
        (Some("UTF8"), Some("OFF")) => {
            ctx.session.lock().await.encoding = TextEncoding::Latin1;
            debug!("[{}] UTF-8 disabled", ctx.control_peer);
            Response::new(200, "UTF8 mode disabled.")
        }
        (Some("UTF8"), Some(_)) => Response::new(501, "Syntax error in parameters or arguments."),
        _ => Response::new(501, "Option not understood."),
    };
    Ok(Some(response))
}
