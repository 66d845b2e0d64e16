use crate::core_ftpcommand::handler::{CommandRequest, HandlerResult};
use crate::core_ftpcommand::response::Response;
use crate::core_network::address::{format_epsv_reply, format_pasv_reply, AddressFamily, EpsvArgument};
use crate::core_network::data_connection::DataCommand;
use crate::core_network::pasv::PassiveListener;
use log::info;
use std::net::IpAddr;

/// Handles the PASV FTP command.
pub async fn handle_pasv_command(request: CommandRequest) -> HandlerResult {
    prepare_passive(request, DataCommand::Pasv, None).await
}

/// Handles the EPSV FTP command (RFC 2428), including `EPSV ALL`.
pub async fn handle_epsv_command(request: CommandRequest) -> HandlerResult {
    match EpsvArgument::parse(&request.command.argument)? {
        EpsvArgument::All => {
            request.ctx.session.lock().await.data_connection.set_epsv_all();
            info!("[{}] EPSV ALL accepted", request.ctx.control_peer);
            Ok(Some(Response::new(200, "EPSV ALL command successful.")))
        }
        EpsvArgument::Default => prepare_passive(request, DataCommand::Epsv, None).await,
        EpsvArgument::Family(family) => {
            prepare_passive(request, DataCommand::Epsv, Some(family)).await
        }
    }
}

/// Binds a listener and records it as the pending data connection. A listener
/// left over from an earlier PASV/EPSV is closed first so its port goes back to
/// the pool.
async fn prepare_passive(
    request: CommandRequest,
    command: DataCommand,
    family: Option<AddressFamily>,
) -> HandlerResult {
    let ctx = request.ctx;
    {
        let mut session = ctx.session.lock().await;
        session.data_connection.check(command)?;
        drop(session.data_connection.take());
    }

    let local_ip = ctx.control_local.ip();
    let control_family = AddressFamily::of(&local_ip);
    let family = family.unwrap_or(control_family);
    let bind_ip = if family == control_family {
        local_ip
    } else {
        family.unspecified()
    };

    let options = ctx.server.pasv_resolver.resolve(family, ctx.control_local);
    let listener = PassiveListener::bind(bind_ip, &options, &ctx.server.port_pools).await?;
    let port = listener.port();

    // PASV can only describe an IPv4 address; otherwise fall back to the 229 form.
    let advertised = options.public_address.unwrap_or(local_ip);
    let response = match (command, advertised) {
        (DataCommand::Pasv, IpAddr::V4(ip)) => Response::new(227, format_pasv_reply(ip, port)),
        _ => Response::new(229, format_epsv_reply(port)),
    };

    info!(
        "[{}] {} listening on {}",
        ctx.control_peer,
        command.name(),
        listener.local_addr()
    );
    ctx.session
        .lock()
        .await
        .data_connection
        .set_passive(command, listener);
    Ok(Some(response))
}
