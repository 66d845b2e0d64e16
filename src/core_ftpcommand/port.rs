use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;
use crate::core_network::address::{parse_eprt_argument, parse_port_argument};
use crate::core_network::data_connection::DataCommand;
use log::info;
use std::net::SocketAddr;

/// Handles the PORT FTP command.
///
/// The connection to the client is made when a transfer starts, not here.
pub async fn handle_port_command(request: CommandRequest) -> HandlerResult {
    let addr = parse_port_argument(&request.command.argument)?;
    prepare_active(request, DataCommand::Port, addr).await
}

/// Handles the EPRT FTP command (RFC 2428).
pub async fn handle_eprt_command(request: CommandRequest) -> HandlerResult {
    let addr = parse_eprt_argument(&request.command.argument, request.ctx.control_peer)?;
    prepare_active(request, DataCommand::Eprt, addr).await
}

async fn prepare_active(
    request: CommandRequest,
    command: DataCommand,
    addr: SocketAddr,
) -> HandlerResult {
    let ctx = request.ctx;
    let mut session = ctx.session.lock().await;
    session.data_connection.check(command)?;
    session.data_connection.set_active(command, addr);
    info!("[{}] {} target set to {}", ctx.control_peer, command.name(), addr);
    Ok(Some(Response::new(200, "Command okay.")))
}
