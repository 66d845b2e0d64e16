use crate::config::Config;
use crate::core_ftpcommand::command::FtpCommand;
use crate::core_ftpcommand::response::Response;
use crate::core_network::data_connection::DataConnection;
use crate::core_network::error::DataConnectionError;
use crate::server::ServerContext;
use crate::session::Session;
use log::{debug, error};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum HandlerError {
    /// A reply chosen by the handler itself.
    #[error("{code} {message}")]
    Ftp { code: u16, message: String },

    #[error("Command not implemented")]
    NotSupported,

    #[error(transparent)]
    DataConnection(#[from] DataConnectionError),

    #[error("Command cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn ftp(code: u16, message: impl Into<String>) -> Self {
        HandlerError::Ftp {
            code,
            message: message.into(),
        }
    }

    pub fn to_ftp_response(&self) -> Response {
        match self {
            HandlerError::Ftp { code, message } => Response::new(*code, message.clone()),
            HandlerError::NotSupported => Response::new(502, "Command not implemented."),
            HandlerError::DataConnection(e) => e.to_ftp_response(),
            HandlerError::Cancelled => Response::new(426, "Connection closed; transfer aborted."),
            HandlerError::Other(e) => {
                error!("Command failed: {:#}", e);
                Response::new(501, "Syntax error in parameters or arguments.")
            }
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        HandlerError::Other(e.into())
    }
}

/// `Ok(None)` means the handler has nothing to say, which is how background
/// commands that were superseded end.
pub type HandlerResult = Result<Option<Response>, HandlerError>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
pub type HandlerFn = Arc<dyn Fn(CommandRequest) -> HandlerFuture + Send + Sync>;

/// Everything a handler gets for one invocation.
pub struct CommandRequest {
    pub command: FtpCommand,
    pub ctx: CommandContext,
    /// Cancelled by ABOR (background commands) and on connection close.
    pub cancel: CancellationToken,
}

/// A registered command: the function plus how the driver must schedule it.
#[derive(Clone)]
pub struct CommandHandler {
    run: HandlerFn,
    requires_login: bool,
    abortable: bool,
    features: Vec<&'static str>,
}

impl CommandHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(CommandRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            run: Arc::new(move |request| -> HandlerFuture { Box::pin(f(request)) }),
            requires_login: true,
            abortable: false,
            features: Vec::new(),
        }
    }

    /// Allowed before the security status reaches `Authorized`.
    pub fn without_login(mut self) -> Self {
        self.requires_login = false;
        self
    }

    /// Runs as the connection's background command and can be cancelled by ABOR.
    pub fn abortable(mut self) -> Self {
        self.abortable = true;
        self
    }

    /// Adds a line to the FEAT listing.
    pub fn with_feature(mut self, feature: &'static str) -> Self {
        self.features.push(feature);
        self
    }

    pub fn requires_login(&self) -> bool {
        self.requires_login
    }

    pub fn is_abortable(&self) -> bool {
        self.abortable
    }

    pub fn features(&self) -> &[&'static str] {
        &self.features
    }

    pub fn call(&self, request: CommandRequest) -> HandlerFuture {
        (self.run)(request)
    }
}

/// Command name to handler. Names are upper case.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, handler: CommandHandler) -> Option<CommandHandler> {
        self.handlers.insert(name.to_ascii_uppercase(), handler)
    }

    pub fn get(&self, name: &str) -> Option<&CommandHandler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// FEAT lines of all handlers, sorted, without duplicates.
    pub fn features(&self) -> Vec<String> {
        let mut features: Vec<String> = self
            .handlers
            .values()
            .flat_map(|h| h.features().iter().map(|f| f.to_string()))
            .collect();
        features.sort();
        features.dedup();
        features
    }
}

/// Per-connection state handed to every handler invocation.
#[derive(Clone)]
pub struct CommandContext {
    pub session: Arc<Mutex<Session>>,
    pub server: Arc<ServerContext>,
    /// Local end of the control connection.
    pub control_local: SocketAddr,
    /// Client end of the control connection.
    pub control_peer: SocketAddr,
    replies: mpsc::Sender<Response>,
}

impl CommandContext {
    pub fn new(
        session: Arc<Mutex<Session>>,
        server: Arc<ServerContext>,
        control_local: SocketAddr,
        control_peer: SocketAddr,
        replies: mpsc::Sender<Response>,
    ) -> Self {
        Self {
            session,
            server,
            control_local,
            control_peer,
            replies,
        }
    }

    pub fn config(&self) -> &Config {
        &self.server.config
    }

    /// Queues an intermediate reply such as `150`. Waits while the queue is full.
    pub async fn reply(&self, response: Response) -> Result<(), HandlerError> {
        self.replies
            .send(response)
            .await
            .map_err(|_| HandlerError::Cancelled)
    }

    /// Opens the data connection prepared by PORT/EPRT/PASV/EPSV. The pending
    /// connection is consumed either way.
    pub async fn open_data_connection(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DataConnection, DataConnectionError> {
        let pending = {
            let mut session = self.session.lock().await;
            session.data_connection.take()
        }
        .ok_or(DataConnectionError::NotPrepared)?;

        debug!(
            "[{}] Opening data connection prepared by {}",
            self.control_peer,
            pending.command().name()
        );
        let timeout = self.config().server.data_connection_timeout();
        pending.open(timeout, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_request: CommandRequest) -> HandlerResult {
        Ok(Some(Response::new(200, "ok")))
    }

    #[test]
    fn registry_lists_names_and_features() {
        let mut registry = HandlerRegistry::new();
        registry.insert("noop", CommandHandler::new(noop).without_login());
        registry.insert("EPSV", CommandHandler::new(noop).with_feature("EPSV"));
        registry.insert("EPRT", CommandHandler::new(noop).with_feature("EPRT").with_feature("EPSV"));

        assert!(registry.contains("NOOP"));
        assert!(!registry.contains("noop"));
        assert_eq!(registry.names(), vec!["EPRT", "EPSV", "NOOP"]);
        assert_eq!(registry.features(), vec!["EPRT", "EPSV"]);
        assert!(!registry.get("NOOP").unwrap().requires_login());
        assert!(registry.get("EPSV").unwrap().requires_login());
    }

    #[test]
    fn errors_map_to_replies() {
        assert_eq!(HandlerError::ftp(550, "No such file.").to_ftp_response().code, 550);
        assert_eq!(HandlerError::NotSupported.to_ftp_response().code, 502);
        assert_eq!(HandlerError::Cancelled.to_ftp_response().code, 426);
        assert_eq!(
            HandlerError::from(DataConnectionError::NotPrepared)
                .to_ftp_response()
                .code,
            425
        );
        assert_eq!(
            HandlerError::from(anyhow::anyhow!("disk on fire"))
                .to_ftp_response()
                .code,
            501
        );
    }
}
