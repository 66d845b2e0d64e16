use crate::config::PasvConfig;
use crate::core_network::address::AddressFamily;
use crate::core_network::data_connection::DataConnection;
use crate::core_network::error::DataConnectionError;
use crate::core_network::port_pool::{PortLease, PortPools};
use log::{debug, trace, warn};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Passive settings resolved for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasvOptions {
    pub min_port: Option<u16>,
    pub max_port: Option<u16>,
    pub public_address: Option<IpAddr>,
}

impl PasvOptions {
    pub fn port_range(&self) -> Option<(u16, u16)> {
        match (self.min_port, self.max_port) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}

/// Decides the passive settings for a connection and address family.
pub trait PasvOptionsResolver: Send + Sync {
    fn resolve(&self, family: AddressFamily, control_local: SocketAddr) -> PasvOptions;
}

/// Static settings from the `[pasv]` section.
pub struct ConfigPasvResolver {
    config: PasvConfig,
}

impl ConfigPasvResolver {
    pub fn new(config: PasvConfig) -> Self {
        Self { config }
    }
}

impl PasvOptionsResolver for ConfigPasvResolver {
    fn resolve(&self, family: AddressFamily, _control_local: SocketAddr) -> PasvOptions {
        let public_address = match family {
            AddressFamily::V4 => self.config.public_address,
            AddressFamily::V6 => self.config.public_address_v6,
        }
        .filter(|ip| AddressFamily::of(ip) == family);

        PasvOptions {
            min_port: self.config.min_port,
            max_port: self.config.max_port,
            public_address,
        }
    }
}

/// A bound passive listener waiting for exactly one client connection.
#[derive(Debug)]
pub struct PassiveListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    lease: Option<PortLease>,
}

impl PassiveListener {
    /// Binds on `ip`, leasing from the options' port range when one is configured.
    pub async fn bind(
        ip: IpAddr,
        options: &PasvOptions,
        pools: &PortPools,
    ) -> Result<Self, DataConnectionError> {
        let Some((min, max)) = options.port_range() else {
            let listener = TcpListener::bind((ip, 0)).await?;
            let local_addr = listener.local_addr()?;
            debug!("Passive listener bound on {} (OS assigned)", local_addr);
            return Ok(Self {
                listener,
                local_addr,
                lease: None,
            });
        };

        let pool = pools
            .get(min, max)
            .ok_or(DataConnectionError::PortsExhausted { min, max })?;
        let mut tried = HashSet::new();

        loop {
            let lease = pool
                .lease(&tried)
                .ok_or(DataConnectionError::PortsExhausted { min, max })?;

            match TcpListener::bind((ip, lease.port())).await {
                Ok(listener) => {
                    let local_addr = listener.local_addr()?;
                    debug!("Passive listener bound on {}", local_addr);
                    return Ok(Self {
                        listener,
                        local_addr,
                        lease: Some(lease),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AddrInUse => {
                    trace!("Passive port {} busy, trying another", lease.port());
                    tried.insert(lease.port());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Accepts one connection; the listener is closed afterwards either way.
    pub async fn accept(
        self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DataConnection, DataConnectionError> {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => return Err(DataConnectionError::Cancelled),
            accepted = tokio::time::timeout(timeout, self.listener.accept()) => accepted,
        };

        match accepted {
            Ok(Ok((stream, peer))) => {
                debug!("Accepted passive data connection from {}", peer);
                Ok(DataConnection::new(stream, self.local_addr, peer, self.lease))
            }
            Ok(Err(e)) => {
                warn!("Passive accept on {} failed: {}", self.local_addr, e);
                Err(e.into())
            }
            Err(_) => Err(DataConnectionError::Timeout(self.local_addr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    fn loopback() -> IpAddr {
        IpAddr::from([127, 0, 0, 1])
    }

    #[test]
    fn resolver_picks_address_per_family() {
        let resolver = ConfigPasvResolver::new(PasvConfig {
            min_port: Some(1),
            max_port: Some(2),
            public_address: Some("203.0.113.7".parse().unwrap()),
            public_address_v6: None,
        });
        let local: SocketAddr = "10.0.0.1:21".parse().unwrap();

        let v4 = resolver.resolve(AddressFamily::V4, local);
        assert_eq!(v4.public_address, Some("203.0.113.7".parse().unwrap()));
        assert_eq!(v4.port_range(), Some((1, 2)));
        assert_eq!(resolver.resolve(AddressFamily::V6, local).public_address, None);
    }

    #[tokio::test]
    async fn binds_os_assigned_port_without_range() {
        let pools = PortPools::new();
        let listener = PassiveListener::bind(loopback(), &PasvOptions::default(), &pools)
            .await
            .unwrap();
        assert_ne!(listener.port(), 0);
    }

    #[tokio::test]
    async fn busy_port_is_skipped() {
        let blocker = TcpListener::bind((loopback(), 0)).await.unwrap();
        let busy = blocker.local_addr().unwrap().port();

        // A two-port range where one port is held by someone else.
        let (min, max) = if busy < u16::MAX { (busy, busy + 1) } else { (busy - 1, busy) };
        let options = PasvOptions {
            min_port: Some(min),
            max_port: Some(max),
            public_address: None,
        };
        let pools = PortPools::new();

        match PassiveListener::bind(loopback(), &options, &pools).await {
            Ok(listener) => {
                assert_ne!(listener.port(), busy);
                assert_eq!(pools.get(min, max).unwrap().available(), 1);
                drop(listener);
                assert_eq!(pools.get(min, max).unwrap().available(), 2);
            }
            // The neighbour port may be taken on a busy host.
            Err(DataConnectionError::PortsExhausted { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[tokio::test]
    async fn exhausted_range_fails_fast() {
        let blocker = TcpListener::bind((loopback(), 0)).await.unwrap();
        let busy = blocker.local_addr().unwrap().port();
        let options = PasvOptions {
            min_port: Some(busy),
            max_port: Some(busy),
            public_address: None,
        };
        let pools = PortPools::new();
        let result = PassiveListener::bind(loopback(), &options, &pools).await;
        assert!(matches!(result, Err(DataConnectionError::PortsExhausted { .. })));
        assert_eq!(pools.get(busy, busy).unwrap().available(), 1);
    }

    #[tokio::test]
    async fn accepts_one_connection_and_carries_lease() {
        let pools = PortPools::new();
        let listener = PassiveListener::bind(loopback(), &PasvOptions::default(), &pools)
            .await
            .unwrap();
        let addr = listener.local_addr();
        let cancel = CancellationToken::new();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let conn = listener.accept(Duration::from_secs(5), &cancel).await.unwrap();
        let client = client.await.unwrap();
        assert_eq!(conn.remote_addr(), client.local_addr().unwrap());
        assert_eq!(conn.local_addr(), addr);
    }

    #[tokio::test]
    async fn accept_honours_cancellation_and_timeout() {
        let pools = PortPools::new();
        let cancel = CancellationToken::new();

        let listener = PassiveListener::bind(loopback(), &PasvOptions::default(), &pools)
            .await
            .unwrap();
        let result = listener.accept(Duration::from_millis(50), &cancel).await;
        assert!(matches!(result, Err(DataConnectionError::Timeout(_))));

        let listener = PassiveListener::bind(loopback(), &PasvOptions::default(), &pools)
            .await
            .unwrap();
        cancel.cancel();
        let result = listener.accept(Duration::from_secs(5), &cancel).await;
        assert!(matches!(result, Err(DataConnectionError::Cancelled)));
    }
}
