use crate::core_ftpcommand::handler::{CommandRequest, HandlerError, HandlerResult};
use crate::core_ftpcommand::response::Response;
use crate::helpers::{copy_until_cancelled, resolve_path};
use log::{error, info, warn};
use tokio::fs::File;

/// Handles the RETR (Retrieve) FTP command.
///
/// Runs as the connection's background command: the file is streamed over the
/// pending data connection until it ends, the client goes away, or ABOR fires.
pub async fn handle_retr_command(request: CommandRequest) -> HandlerResult {
    let CommandRequest { command, ctx, cancel } = request;
    if command.argument.trim().is_empty() {
        warn!("RETR command received with no arguments");
        return Err(HandlerError::ftp(501, "Syntax error in parameters or arguments."));
    }

    let path = resolve_path(&*ctx.session.lock().await, &command.argument)?;
    let mut file = File::open(&path).await.map_err(|e| {
        error!("File not found or could not be opened: {:?}, error: {}", path, e);
        HandlerError::ftp(550, "File not found.")
    })?;
    if !file.metadata().await?.is_file() {
        return Err(HandlerError::ftp(550, "Not a plain file."));
    }

    ctx.reply(Response::new(150, "Opening data connection.")).await?;
    let mut connection = ctx.open_data_connection(&cancel).await?;
    info!("[{}] Sending file: {:?}", ctx.control_peer, path);

    let copied = copy_until_cancelled(&mut file, connection.stream_mut(), &cancel).await;
    if let Err(e) = connection.close().await {
        warn!("Failed to close data connection: {}", e);
    }

    let bytes = copied?;
    info!("[{}] Sent {} bytes from {:?}", ctx.control_peer, bytes, path);
    Ok(Some(Response::new(226, "Transfer complete.")))
}
