use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;
use crate::session::TransferType;

/// Handles the TYPE FTP command.
///
/// Accepts ASCII (`A`, optionally with the `N` format), Image (`I`) and
/// `L <size>`. EBCDIC and the other format controls get `504`.
pub async fn handle_type_command(request: CommandRequest) -> HandlerResult {
    let CommandRequest { command, ctx, .. } = request;
    let parts: Vec<String> = command
        .argument
        .split_whitespace()
        .map(str::to_ascii_uppercase)
        .collect();

    let transfer_type = match parts.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["A"] | ["A", "N"] => TransferType::Ascii,
        ["I"] => TransferType::Image,
        ["L", size] => match size.parse::<u8>() {
            Ok(byte_size) if byte_size > 0 => TransferType::Local(byte_size),
            _ => return Ok(Some(Response::new(504, "Invalid byte size parameter."))),
        },
        ["L"] => {
            return Ok(Some(Response::new(
                504,
                "Byte size parameter required for TYPE L.",
            )))
        }
        [] => return Ok(Some(Response::new(501, "Syntax error in parameters or arguments."))),
        _ => {
            return Ok(Some(Response::new(
                504,
                "Command not implemented for that parameter.",
            )))
        }
    };

    ctx.session.lock().await.transfer_type = transfer_type;
    let response = match transfer_type {
        TransferType::Ascii => Response::new(200, "Type set to A."),
        TransferType::Image => Response::new(200, "Type set to I."),
        TransferType::Local(size) => Response::new(200, format!("Type set to L ({}).", size)),
    };
    Ok(Some(response))
}
