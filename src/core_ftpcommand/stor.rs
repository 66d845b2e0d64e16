use crate::core_ftpcommand::handler::{CommandRequest, HandlerError, HandlerResult};
use crate::core_ftpcommand::response::Response;
use crate::helpers::{copy_until_cancelled, resolve_path};
use log::{error, info, warn};
use tokio::fs::File;

/// Handles the STOR (Store) FTP command.
///
/// Background command like RETR. A transfer cut short by ABOR leaves the
/// partial file behind.
pub async fn handle_stor_command(request: CommandRequest) -> HandlerResult {
    let CommandRequest { command, ctx, cancel } = request;
    if command.argument.trim().is_empty() {
        warn!("STOR command received with no arguments");
        return Err(HandlerError::ftp(501, "Syntax error in parameters or arguments."));
    }

    let path = resolve_path(&*ctx.session.lock().await, &command.argument)?;
    let mut file = match File::create(&path).await {
        Ok(f) => f,
        Err(e) => {
            error!("Could not create file: {:?}, error: {}", path, e);
            return Err(HandlerError::ftp(553, "Could not create file."));
        }
    };

    ctx.reply(Response::new(150, "Ok to send data.")).await?;
    let mut connection = ctx.open_data_connection(&cancel).await?;
    info!("[{}] Receiving file: {:?}", ctx.control_peer, path);

    let copied = copy_until_cancelled(connection.stream_mut(), &mut file, &cancel).await;
    if let Err(e) = connection.close().await {
        warn!("Failed to close data connection: {}", e);
    }

    let bytes = copied?;
    file.sync_all().await?;
    info!("[{}] Stored {} bytes in {:?}", ctx.control_peer, bytes, path);
    Ok(Some(Response::new(226, "Transfer complete.")))
}
