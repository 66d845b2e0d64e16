use crate::core_network::data_connection::DataConnection;
use crate::core_network::error::DataConnectionError;
use log::{error, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Opens an active-mode (PORT/EPRT) data connection to the client's endpoint.
pub async fn connect_active(
    addr: SocketAddr,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<DataConnection, DataConnectionError> {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return Err(DataConnectionError::Cancelled),
        connected = tokio::time::timeout(timeout, TcpStream::connect(addr)) => connected,
    };

    match connected {
        Ok(Ok(stream)) => {
            let local_addr = stream.local_addr()?;
            info!("Active data connection established with {}", addr);
            Ok(DataConnection::new(stream, local_addr, addr, None))
        }
        Ok(Err(e)) => {
            error!("Failed to connect to client {}: {}", addr, e);
            Err(e.into())
        }
        Err(_) => Err(DataConnectionError::Timeout(addr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_listening_client() {
        let client = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = client.local_addr().unwrap();
        let cancel = CancellationToken::new();

        let conn = connect_active(addr, Duration::from_secs(5), &cancel).await.unwrap();
        let (_, peer) = client.accept().await.unwrap();
        assert_eq!(conn.remote_addr(), addr);
        assert_eq!(conn.local_addr(), peer);
    }

    #[tokio::test]
    async fn refused_connection_is_io_error() {
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let cancel = CancellationToken::new();
        let result = connect_active(addr, Duration::from_secs(5), &cancel).await;
        assert!(matches!(result, Err(DataConnectionError::Io(_))));
    }

    #[tokio::test]
    async fn cancelled_before_connect() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let result = connect_active(addr, Duration::from_secs(5), &cancel).await;
        assert!(matches!(result, Err(DataConnectionError::Cancelled)));
    }
}
