use crate::core_network::error::DataConnectionError;
use crate::core_network::pasv::PassiveListener;
use crate::core_network::port::connect_active;
use crate::core_network::port_pool::PortLease;
use log::debug;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// An open data connection. Dropping or closing it returns any leased port.
#[derive(Debug)]
pub struct DataConnection {
    stream: TcpStream,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    lease: Option<PortLease>,
}

impl DataConnection {
    pub fn new(
        stream: TcpStream,
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        lease: Option<PortLease>,
    ) -> Self {
        Self {
            stream,
            local_addr,
            remote_addr,
            lease,
        }
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub async fn close(mut self) -> std::io::Result<()> {
        debug!("Closing data connection {} -> {}", self.local_addr, self.remote_addr);
        let result = self.stream.shutdown().await;
        drop(self.lease.take());
        result
    }
}

/// Which command prepared the pending data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCommand {
    Pasv,
    Epsv,
    Port,
    Eprt,
}

impl DataCommand {
    pub fn is_extended(&self) -> bool {
        matches!(self, DataCommand::Epsv | DataCommand::Eprt)
    }

    pub fn is_passive(&self) -> bool {
        matches!(self, DataCommand::Pasv | DataCommand::Epsv)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataCommand::Pasv => "PASV",
            DataCommand::Epsv => "EPSV",
            DataCommand::Port => "PORT",
            DataCommand::Eprt => "EPRT",
        }
    }
}

#[derive(Debug)]
enum Prepared {
    Passive(PassiveListener),
    Active(SocketAddr),
}

/// A data connection announced to the client but not opened yet.
#[derive(Debug)]
pub struct PendingDataConnection {
    prepared: Prepared,
    command: DataCommand,
}

impl PendingDataConnection {
    pub fn command(&self) -> DataCommand {
        self.command
    }

    /// Accepts (passive) or connects (active).
    pub async fn open(
        self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DataConnection, DataConnectionError> {
        match self.prepared {
            Prepared::Passive(listener) => listener.accept(timeout, cancel).await,
            Prepared::Active(addr) => connect_active(addr, timeout, cancel).await,
        }
    }
}

/// Per-session data connection state.
///
/// Holds at most one pending connection. The family chosen by the pending
/// connection (PORT-style or PASV-style) is locked until it is consumed or the
/// session is reinitialised; `EPSV ALL` locks out the non-extended commands.
#[derive(Debug, Default)]
pub struct DataConnectionFeature {
    pending: Option<PendingDataConnection>,
    epsv_all: bool,
}

impl DataConnectionFeature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epsv_all(&self) -> bool {
        self.epsv_all
    }

    pub fn set_epsv_all(&mut self) {
        self.epsv_all = true;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Rejects `command` if `EPSV ALL` is active or the other family is pending.
    pub fn check(&self, command: DataCommand) -> Result<(), DataConnectionError> {
        if self.epsv_all && !command.is_extended() {
            return Err(DataConnectionError::ExtendedOnly);
        }
        match &self.pending {
            Some(pending) if pending.command.is_passive() != command.is_passive() => {
                Err(DataConnectionError::ModeConflict(pending.command.name()))
            }
            _ => Ok(()),
        }
    }

    /// Replaces any pending connection; a replaced passive listener frees its port.
    pub fn set_passive(&mut self, command: DataCommand, listener: PassiveListener) {
        self.pending = Some(PendingDataConnection {
            prepared: Prepared::Passive(listener),
            command,
        });
    }

    pub fn set_active(&mut self, command: DataCommand, addr: SocketAddr) {
        self.pending = Some(PendingDataConnection {
            prepared: Prepared::Active(addr),
            command,
        });
    }

    pub fn take(&mut self) -> Option<PendingDataConnection> {
        self.pending.take()
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.epsv_all = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_network::pasv::PasvOptions;
    use crate::core_network::port_pool::PortPools;

    #[test]
    fn epsv_all_allows_only_extended_commands() {
        let mut feature = DataConnectionFeature::new();
        feature.set_epsv_all();
        assert!(matches!(feature.check(DataCommand::Pasv), Err(DataConnectionError::ExtendedOnly)));
        assert!(matches!(feature.check(DataCommand::Port), Err(DataConnectionError::ExtendedOnly)));
        assert!(feature.check(DataCommand::Epsv).is_ok());
        assert!(feature.check(DataCommand::Eprt).is_ok());

        feature.reset();
        assert!(feature.check(DataCommand::Pasv).is_ok());
    }

    #[test]
    fn pending_active_locks_out_passive() {
        let mut feature = DataConnectionFeature::new();
        feature.set_active(DataCommand::Port, "127.0.0.1:5000".parse().unwrap());
        assert!(matches!(
            feature.check(DataCommand::Epsv),
            Err(DataConnectionError::ModeConflict("PORT"))
        ));
        assert!(feature.check(DataCommand::Eprt).is_ok());

        let pending = feature.take().unwrap();
        assert_eq!(pending.command(), DataCommand::Port);
        assert!(feature.check(DataCommand::Pasv).is_ok());
    }

    #[tokio::test]
    async fn replacing_passive_listener_returns_port() {
        let blocker = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = blocker.local_addr().unwrap().port();
        drop(blocker);

        let pools = PortPools::new();
        let options = PasvOptions {
            min_port: Some(base),
            max_port: Some(base.saturating_add(3)),
            public_address: None,
        };
        let pool = pools.get(base, base.saturating_add(3)).unwrap();
        let start = pool.available();
        let ip = "127.0.0.1".parse().unwrap();

        let mut feature = DataConnectionFeature::new();
        for _ in 0..10 {
            if let Ok(listener) = PassiveListener::bind(ip, &options, &pools).await {
                feature.set_passive(DataCommand::Pasv, listener);
                assert_eq!(pool.available(), start - 1);
            }
        }
        feature.reset();
        assert_eq!(pool.available(), start);
    }
}
