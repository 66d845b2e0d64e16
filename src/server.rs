use crate::config::Config;
use crate::core_auth::Authenticator;
use crate::core_connection::ConnectionSummary;
use crate::core_ftpcommand::handler::HandlerRegistry;
use crate::core_network::network::accept_loop;
use crate::core_network::pasv::{ConfigPasvResolver, PasvOptionsResolver};
use crate::core_network::port_pool::PortPools;
use crate::core_statemachine::security::{default_security_machine, security_machine};
use crate::core_statemachine::{SecurityStateMachine, SecurityStatus, Transition, TransitionTableError};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server is already running on {0}")]
    AlreadyRunning(SocketAddr),

    #[error("Invalid security transition table: {0}")]
    SecurityTable(#[from] TransitionTableError),
}

/// Connection lifecycle notifications for observers.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    ConnectionOpened { id: u64, peer: SocketAddr },
    ConnectionClosed(ConnectionSummary),
}

/// Everything shared by all connections of one server.
pub struct ServerContext {
    pub config: Arc<Config>,
    pub handlers: HandlerRegistry,
    pub authenticator: Arc<dyn Authenticator>,
    pub pasv_resolver: Arc<dyn PasvOptionsResolver>,
    pub port_pools: PortPools,
    security: SecurityStateMachine,
}

impl ServerContext {
    pub fn new(
        config: Config,
        handlers: HandlerRegistry,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, ServerError> {
        let pasv_resolver = Arc::new(ConfigPasvResolver::new(config.pasv.clone()));
        Ok(Self {
            config: Arc::new(config),
            handlers,
            authenticator,
            pasv_resolver,
            port_pools: PortPools::new(),
            security: default_security_machine()?,
        })
    }

    pub fn with_pasv_resolver(mut self, resolver: Arc<dyn PasvOptionsResolver>) -> Self {
        self.pasv_resolver = resolver;
        self
    }

    /// Replaces the security policy. Each table becomes one sub-machine; the
    /// tables are validated here, not when a connection starts.
    pub fn with_security_tables(
        mut self,
        tables: Vec<Vec<Transition<SecurityStatus>>>,
    ) -> Result<Self, ServerError> {
        self.security = security_machine(tables)?;
        Ok(self)
    }

    /// A fresh machine, in its initial status, for a new connection.
    pub fn security_machine(&self) -> SecurityStateMachine {
        let mut machine = self.security.clone();
        machine.reset();
        machine
    }
}

struct Running {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    accept_task: JoinHandle<()>,
}

/// The server host: owns the control listener and every connection.
pub struct FtpServer {
    context: Arc<ServerContext>,
    events: broadcast::Sender<ServerEvent>,
    paused: watch::Sender<bool>,
    running: Mutex<Option<Running>>,
}

impl FtpServer {
    pub fn new(context: ServerContext) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (paused, _) = watch::channel(false);
        Self {
            context: Arc::new(context),
            events,
            paused,
            running: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().map(|r| r.local_addr)
    }

    /// Binds the configured address and starts accepting. Returns the bound
    /// address, which differs from the configured one when port 0 was asked for.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        if let Some(addr) = self.local_addr() {
            return Err(ServerError::AlreadyRunning(addr));
        }

        let server = &self.context.config.server;
        let addr = SocketAddr::new(server.listen_address, server.listen_port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let cancel = CancellationToken::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.context),
            self.events.clone(),
            self.paused.subscribe(),
            cancel.clone(),
        ));

        let mut running = self.lock_running();
        if let Some(existing) = running.as_ref() {
            // Lost a race with a concurrent start.
            cancel.cancel();
            return Err(ServerError::AlreadyRunning(existing.local_addr));
        }
        *running = Some(Running {
            local_addr,
            cancel,
            accept_task,
        });
        info!("Server listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Stops accepting, cancels every connection and waits for them to close.
    pub async fn stop(&self) {
        let Some(running) = self.lock_running().take() else {
            return;
        };
        info!("Stopping server on {}", running.local_addr);
        running.cancel.cancel();
        if let Err(e) = running.accept_task.await {
            error!("Accept loop failed: {}", e);
        }
        info!("Server stopped");
    }

    /// Stops accepting new connections; existing ones keep running.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_auth::PasswdAuthenticator;
    use crate::core_ftpcommand::handlers::initialize_command_handlers;

    fn context() -> ServerContext {
        let mut config = Config::default();
        config.server.listen_address = "127.0.0.1".parse().unwrap();
        config.server.listen_port = 0;
        ServerContext::new(
            config,
            initialize_command_handlers(),
            Arc::new(PasswdAuthenticator::anonymous_only()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn start_stop_and_restart() {
        let server = FtpServer::new(context());
        assert!(server.local_addr().is_none());

        let addr = server.start().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(matches!(server.start().await, Err(ServerError::AlreadyRunning(_))));

        server.stop().await;
        assert!(server.local_addr().is_none());
        server.stop().await;

        server.start().await.unwrap();
        server.stop().await;
    }

    #[test]
    fn rejects_ambiguous_security_table() {
        use SecurityStatus::*;
        let table = vec![
            Transition::on_code(Unauthenticated, NeedPassword, &["USER"], 331),
            Transition::new(Unauthenticated, Authorized, &["USER"], 300..=399),
        ];
        let result = context().with_security_tables(vec![table]);
        assert!(matches!(result, Err(ServerError::SecurityTable(_))));
    }

    #[test]
    fn pause_flag() {
        let server = FtpServer::new(context());
        assert!(!server.is_paused());
        server.pause();
        assert!(server.is_paused());
        server.resume();
        assert!(!server.is_paused());
    }
}
