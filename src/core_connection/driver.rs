use crate::constants::READ_BUFFER_SIZE;
use crate::core_connection::background::{BackgroundSlot, Finished};
use crate::core_connection::writer::{run_response_writer, WriterExit};
use crate::core_ftpcommand::collector::{Collected, CommandCollector};
use crate::core_ftpcommand::command::FtpCommand;
use crate::core_ftpcommand::encoding::TextEncoding;
use crate::core_ftpcommand::handler::{CommandContext, CommandRequest, HandlerFuture, HandlerResult};
use crate::core_ftpcommand::response::Response;
use crate::core_statemachine::{SecurityStateMachine, SecurityStatus};
use crate::server::ServerContext;
use crate::session::Session;
use chrono::{DateTime, Local};
use log::{debug, error, info, trace, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How long queued replies may take to reach the client once the connection closes.
const WRITER_GRACE: Duration = Duration::from_secs(5);
/// How long a closing `421` may wait for room in a full reply queue.
const FATAL_REPLY_WAIT: Duration = Duration::from_secs(1);

type WriterHandle = JoinHandle<std::io::Result<WriterExit>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    GreetingSent,
    Serving,
    Closing,
    Closed,
}

impl ConnectionState {
    /// `Serving` is re-entered after every command; REIN goes back to
    /// `GreetingSent`. Any live state may start closing.
    pub fn can_advance_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Accepted, GreetingSent)
                | (GreetingSent, Serving)
                | (Serving, Serving)
                | (Serving, GreetingSent)
                | (Accepted | GreetingSent | Serving, Closing)
                | (Closing, Closed)
        )
    }

    /// Commands are only dispatched while serving.
    pub fn accepts_commands(self) -> bool {
        self == ConnectionState::Serving
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Quit,
    PeerClosed,
    /// A `421` was sent.
    Fatal,
    IdleTimeout,
    Shutdown,
    Transport(String),
}

/// What is left of a connection after it closed.
#[derive(Debug, Clone)]
pub struct ConnectionSummary {
    pub id: u64,
    pub peer: SocketAddr,
    pub connected_at: DateTime<Local>,
    pub commands: u64,
    pub reason: CloseReason,
}

enum Flow {
    Continue,
    Close(CloseReason),
}

/// Runs one control connection until it closes.
///
/// The socket is split: this task reads and dispatches, a writer task drains the
/// reply queue, and at most one abortable command runs in the background.
/// `cancel` stops all three.
pub async fn run_connection(
    stream: TcpStream,
    id: u64,
    peer: SocketAddr,
    server: Arc<ServerContext>,
    cancel: CancellationToken,
) -> ConnectionSummary {
    let connected_at = Local::now();
    let peer = canonical(peer);
    let local = match stream.local_addr() {
        Ok(addr) => canonical(addr),
        Err(e) => {
            warn!("[{}] Cannot read local address: {}", peer, e);
            return ConnectionSummary {
                id,
                peer,
                connected_at,
                commands: 0,
                reason: CloseReason::Transport(e.to_string()),
            };
        }
    };

    let (reader, write_half) = stream.into_split();
    let capacity = server.config.server.response_queue_capacity.max(1);
    let (replies, queue) = mpsc::channel(capacity);
    let (encoding_tx, encoding_rx) = watch::channel(TextEncoding::default());
    let writer_stop = CancellationToken::new();
    let writer = tokio::spawn(run_response_writer(
        write_half,
        queue,
        encoding_rx,
        writer_stop.clone(),
        peer,
    ));

    let session = Arc::new(Mutex::new(Session::new(server.config.storage.root.clone())));
    let ctx = CommandContext::new(session, server.clone(), local, peer, replies.clone());
    let mut driver = ConnectionDriver {
        id,
        peer,
        connected_at,
        state: ConnectionState::Accepted,
        security: server.security_machine(),
        collector: CommandCollector::new(server.config.server.max_command_length),
        background: BackgroundSlot::default(),
        idle_timeout: server.config.server.idle_timeout(),
        ctx,
        replies,
        encoding: encoding_tx,
        cancel,
        commands: 0,
    };

    let mut writer = Some(writer);
    let reason = driver.serve(reader, &mut writer).await;
    driver.close(writer, writer_stop, reason).await
}

fn canonical(addr: SocketAddr) -> SocketAddr {
    SocketAddr::new(addr.ip().to_canonical(), addr.port())
}

/// Resolves when the writer task ends; never while it is already gone.
async fn join_writer(writer: &mut Option<WriterHandle>) -> Result<std::io::Result<WriterExit>, JoinError> {
    let Some(handle) = writer.as_mut() else {
        return std::future::pending().await;
    };
    let exit = handle.await;
    *writer = None;
    exit
}

fn into_response(result: HandlerResult) -> Option<Response> {
    match result {
        Ok(response) => response,
        Err(e) => Some(e.to_ftp_response()),
    }
}

/// Reply for a handler task that panicked or was torn down.
fn handler_failed(peer: SocketAddr, name: &str, e: JoinError) -> Response {
    error!("[{}] {} failed: {}", peer, name, e);
    Response::new(501, "Syntax error in parameters or arguments.")
}

/// Runs a handler on its own task and waits for it, so a panic in the
/// handler becomes a reply instead of ending the connection.
async fn run_isolated(peer: SocketAddr, name: &str, future: HandlerFuture) -> Option<Response> {
    match tokio::spawn(future).await {
        Ok(result) => into_response(result),
        Err(e) => Some(handler_failed(peer, name, e)),
    }
}

struct ConnectionDriver {
    id: u64,
    peer: SocketAddr,
    connected_at: DateTime<Local>,
    state: ConnectionState,
    ctx: CommandContext,
    security: SecurityStateMachine,
    collector: CommandCollector,
    background: BackgroundSlot,
    replies: mpsc::Sender<Response>,
    encoding: watch::Sender<TextEncoding>,
    cancel: CancellationToken,
    idle_timeout: Duration,
    commands: u64,
}

impl ConnectionDriver {
    fn set_state(&mut self, state: ConnectionState) {
        if !self.state.can_advance_to(state) {
            warn!("[{}] Ignoring state change {:?} -> {:?}", self.peer, self.state, state);
            return;
        }
        if self.state != state {
            trace!("[{}] {:?} -> {:?}", self.peer, self.state, state);
        }
        self.state = state;
    }

    /// Queues a closing `421` without blocking the shutdown for long. The
    /// connection closes either way.
    async fn send_fatal(&mut self, text: &str) {
        let sent = tokio::time::timeout(
            FATAL_REPLY_WAIT,
            self.replies.send(Response::new(421, text)),
        )
        .await;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!("[{}] Reply writer gone, 421 not sent", self.peer),
            Err(_) => debug!("[{}] Reply queue full, 421 not sent", self.peer),
        }
    }

    async fn serve(&mut self, mut reader: OwnedReadHalf, writer: &mut Option<WriterHandle>) -> CloseReason {
        let greeting = Response::new(220, self.ctx.config().server.greeting.clone());
        if let Flow::Close(reason) = self.enqueue(greeting).await {
            return reason;
        }
        self.set_state(ConnectionState::GreetingSent);
        self.set_state(ConnectionState::Serving);

        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let idle = tokio::time::sleep(self.idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("[{}] Connection cancelled", self.peer);
                    self.send_fatal("Service not available, server shutting down.").await;
                    return CloseReason::Shutdown;
                }
                read = reader.read(&mut buffer) => {
                    let n = match read {
                        Ok(0) => {
                            debug!("[{}] Client disconnected", self.peer);
                            return CloseReason::PeerClosed;
                        }
                        Ok(n) => n,
                        Err(e) => {
                            warn!("[{}] Read error: {}", self.peer, e);
                            return CloseReason::Transport(e.to_string());
                        }
                    };
                    idle.as_mut().reset(Instant::now() + self.idle_timeout);

                    let items: Vec<Collected> = self.collector.collect(&buffer[..n]).collect();
                    for item in items {
                        if let Flow::Close(reason) = self.handle_item(item).await {
                            return reason;
                        }
                    }
                }
                exit = join_writer(writer) => {
                    return match exit {
                        Ok(Ok(WriterExit::Fatal)) => CloseReason::Fatal,
                        Ok(Ok(WriterExit::Drained)) => CloseReason::Shutdown,
                        Ok(Err(e)) => {
                            warn!("[{}] Write error: {}", self.peer, e);
                            CloseReason::Transport(e.to_string())
                        }
                        Err(e) => {
                            error!("[{}] Reply writer failed: {}", self.peer, e);
                            CloseReason::Transport(e.to_string())
                        }
                    };
                }
                finished = self.background.wait(), if self.background.is_active() => {
                    idle.as_mut().reset(Instant::now() + self.idle_timeout);
                    if let Flow::Close(reason) = self.finish_background(finished).await {
                        return reason;
                    }
                }
                _ = &mut idle, if !self.background.is_active() => {
                    info!("[{}] Idle timeout", self.peer);
                    self.send_fatal("Idle timeout, closing control connection.").await;
                    return CloseReason::IdleTimeout;
                }
            }
        }
    }

    async fn handle_item(&mut self, item: Collected) -> Flow {
        match item {
            Collected::Command(command) if self.state.accepts_commands() => {
                self.dispatch(command).await
            }
            Collected::Command(command) => {
                debug!("[{}] Dropping {} in state {:?}", self.peer, command.name, self.state);
                Flow::Continue
            }
            Collected::Abort => {
                debug!("[{}] TELNET Interrupt Process", self.peer);
                self.background.interrupt();
                Flow::Continue
            }
            Collected::Sync => {
                trace!("[{}] TELNET Synch", self.peer);
                Flow::Continue
            }
            Collected::Overlong => {
                warn!("[{}] Command line too long", self.peer);
                self.enqueue(Response::new(500, "Command line too long.")).await
            }
        }
    }

    async fn dispatch(&mut self, command: FtpCommand) -> Flow {
        self.commands += 1;
        info!("[{}] Received command: {}", self.peer, command);

        let name = command.name.clone();
        let response = match name.as_str() {
            "ABOR" => {
                let (completed, reply) = self.abort().await;
                if let Some(completed) = completed {
                    if let Flow::Close(reason) = self.enqueue(completed).await {
                        return Flow::Close(reason);
                    }
                }
                Some(reply)
            }
            "REIN" => Some(self.reinitialize().await),
            _ if self.security.handles(&name) => Some(self.execute_secured(command).await),
            _ => self.execute(command).await,
        };
        self.sync_encoding().await;
        self.set_state(ConnectionState::Serving);

        let Some(response) = response else {
            return Flow::Continue;
        };
        let quit = name == "QUIT" && response.code == 221;
        match self.enqueue(response).await {
            Flow::Continue if quit => Flow::Close(CloseReason::Quit),
            flow => flow,
        }
    }

    /// Security commands: the state machine decides whether they may run and
    /// follows their reply code.
    async fn execute_secured(&mut self, command: FtpCommand) -> Response {
        let handler = self.ctx.server.handlers.get(&command.name).cloned();
        let request = CommandRequest {
            command: command.clone(),
            ctx: self.ctx.clone(),
            cancel: self.cancel.child_token(),
        };
        let peer = self.peer;
        let name = command.name.clone();

        self.security
            .execute(&command, move || async move {
                let response = match handler {
                    Some(handler) => run_isolated(peer, &name, handler.call(request)).await,
                    None => Some(Response::new(502, "Command not implemented.")),
                };
                response.unwrap_or_else(|| {
                    Response::new(451, "Requested action aborted: local error in processing.")
                })
            })
            .await
    }

    async fn execute(&mut self, command: FtpCommand) -> Option<Response> {
        let Some(handler) = self.ctx.server.handlers.get(&command.name).cloned() else {
            debug!("[{}] Unknown command {}", self.peer, command.name);
            return Some(Response::new(500, "Syntax error, command unrecognized."));
        };

        if handler.requires_login() && self.security.status() != SecurityStatus::Authorized {
            return Some(Response::new(530, "Not logged in."));
        }

        if handler.is_abortable() && self.background.is_active() {
            return Some(Response::new(503, "Parallel commands aren't allowed."));
        }

        let name = command.name.clone();
        let cancel = self.cancel.child_token();
        let request = CommandRequest {
            command,
            ctx: self.ctx.clone(),
            cancel: cancel.clone(),
        };

        if handler.is_abortable() {
            let handle = tokio::spawn(handler.call(request));
            return match self.background.start(&name, cancel, handle) {
                Ok(()) => None,
                Err(e) => Some(Response::new(503, format!("{}.", e))),
            };
        }

        run_isolated(self.peer, &name, handler.call(request)).await
    }

    async fn finish_background(&mut self, finished: Finished) -> Flow {
        let response = match finished.result {
            Ok(result) => into_response(result),
            Err(e) if e.is_cancelled() => None,
            Err(e) => Some(handler_failed(self.peer, &finished.name, e)),
        };
        match response {
            Some(response) => self.enqueue(response).await,
            None => Flow::Continue,
        }
    }

    /// Cancels the background command. A command that had already completed
    /// with a reply still gets it sent, ahead of the ABOR reply; a cancelled or
    /// failed one is silently dropped.
    async fn abort(&mut self) -> (Option<Response>, Response) {
        let Some(finished) = self.background.abort().await else {
            return (None, Response::new(226, "Cannot abort - no active transfer."));
        };
        info!("[{}] {} aborted", self.peer, finished.name);
        let completed = match finished.result {
            Ok(Ok(Some(response))) if response.code != 426 => Some(response),
            Ok(Ok(_)) | Ok(Err(_)) => None,
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                error!("[{}] {} failed: {}", self.peer, finished.name, e);
                None
            }
        };
        (completed, Response::new(226, "ABOR command successful."))
    }

    async fn reinitialize(&mut self) -> Response {
        self.background.dispose();
        self.security.reset();
        self.ctx.session.lock().await.reset();
        info!("[{}] Session reinitialized", self.peer);
        self.set_state(ConnectionState::GreetingSent);
        Response::new(220, "Service ready for new user.")
    }

    /// Applies an encoding switch made by a handler to both directions.
    async fn sync_encoding(&mut self) {
        let encoding = self.ctx.session.lock().await.encoding;
        if encoding != self.collector.encoding() {
            debug!("[{}] Control channel encoding: {:?}", self.peer, encoding);
            self.collector.set_encoding(encoding);
            self.encoding.send_replace(encoding);
        }
    }

    /// Queues a reply; a `421` ends the connection once it has been written.
    async fn enqueue(&mut self, response: Response) -> Flow {
        let fatal = response.is_fatal();
        if self.replies.send(response).await.is_err() {
            return Flow::Close(CloseReason::Transport(String::from(
                "reply writer stopped",
            )));
        }
        if fatal {
            Flow::Close(CloseReason::Fatal)
        } else {
            Flow::Continue
        }
    }

    async fn close(
        mut self,
        writer: Option<WriterHandle>,
        writer_stop: CancellationToken,
        reason: CloseReason,
    ) -> ConnectionSummary {
        self.set_state(ConnectionState::Closing);
        self.background.dispose();
        writer_stop.cancel();

        if let Some(mut handle) = writer {
            match tokio::time::timeout(WRITER_GRACE, &mut handle).await {
                Ok(Ok(Err(e))) => debug!("[{}] Write error while closing: {}", self.peer, e),
                Ok(Err(e)) => error!("[{}] Reply writer failed: {}", self.peer, e),
                Ok(Ok(Ok(_))) => {}
                Err(_) => {
                    warn!("[{}] Client not reading, dropping queued replies", self.peer);
                    handle.abort();
                }
            }
        }

        self.ctx.session.lock().await.data_connection.reset();
        self.set_state(ConnectionState::Closed);
        info!(
            "[{}] Connection closed after {} commands ({:?})",
            self.peer, self.commands, reason
        );

        ConnectionSummary {
            id: self.id,
            peer: self.peer,
            connected_at: self.connected_at,
            commands: self.commands,
            reason,
        }
    }
}
