use crate::core_connection::driver::run_connection;
use crate::core_connection::{CloseReason, ConnectionSummary};
use crate::server::{ServerContext, ServerEvent};
use chrono::Local;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

/// How long open connections get to wind down once the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Accepts control connections until `cancel` fires, then waits for the open
/// connections to close. While `paused` is true nothing is accepted, but
/// existing connections keep running.
pub async fn accept_loop(
    listener: TcpListener,
    context: Arc<ServerContext>,
    events: broadcast::Sender<ServerEvent>,
    mut paused: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    let mut connections = JoinSet::new();
    let mut next_id: u64 = 0;

    loop {
        let accepting = !*paused.borrow();
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = paused.changed() => {
                if changed.is_err() {
                    break;
                }
                info!("Listener {}", if *paused.borrow() { "paused" } else { "resumed" });
            }
            accepted = listener.accept(), if accepting => {
                let (socket, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                next_id += 1;
                let id = next_id;
                info!("New connection #{} from {}", id, peer);
                let _ = events.send(ServerEvent::ConnectionOpened { id, peer });

                let context = Arc::clone(&context);
                let events = events.clone();
                let token = cancel.child_token();
                connections.spawn(async move {
                    let connected_at = Local::now();
                    let task = AbortOnDropHandle::new(tokio::spawn(run_connection(
                        socket, id, peer, context, token,
                    )));
                    let summary = match task.await {
                        Ok(summary) => summary,
                        Err(e) => {
                            error!("Connection #{} failed: {}", id, e);
                            ConnectionSummary {
                                id,
                                peer,
                                connected_at,
                                commands: 0,
                                reason: CloseReason::Transport(e.to_string()),
                            }
                        }
                    };
                    let _ = events.send(ServerEvent::ConnectionClosed(summary));
                });
            }
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    error!("Connection task failed: {}", e);
                }
            }
        }
    }

    drop(listener);
    debug!("Waiting for {} connections to close", connections.len());
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!("Connection task failed: {}", e);
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!("Dropping {} connections that did not close in time", connections.len());
        connections.shutdown().await;
    }
}
