// Errors raised while negotiating or opening a data connection
use crate::core_ftpcommand::response::Response;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataConnectionError {
    #[error("Malformed address argument: {0}")]
    InvalidAddress(String),

    #[error("Network protocol not supported: {0}")]
    NotSupported(String),

    #[error("Only extended commands are accepted after EPSV ALL")]
    ExtendedOnly,

    #[error("Data connection family already chosen with {0}")]
    ModeConflict(&'static str),

    #[error("No free passive port in {min}..={max}")]
    PortsExhausted { min: u16, max: u16 },

    #[error("No data connection was prepared with PORT or PASV")]
    NotPrepared,

    #[error("Timed out waiting for data connection on {0}")]
    Timeout(SocketAddr),

    #[error("Data connection cancelled")]
    Cancelled,

    #[error("Data connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataConnectionError {
    pub fn to_ftp_response(&self) -> Response {
        match self {
            DataConnectionError::InvalidAddress(_) => {
                Response::new(501, "Syntax error in parameters or arguments.")
            }
            DataConnectionError::NotSupported(_) => {
                Response::new(522, "Network protocol not supported, use (1,2).")
            }
            DataConnectionError::ExtendedOnly => {
                Response::new(500, "Only EPSV and EPRT are allowed after EPSV ALL.")
            }
            DataConnectionError::ModeConflict(used) => Response::new(
                500,
                format!("Data connection already prepared with {}.", used),
            ),
            DataConnectionError::PortsExhausted { .. } => {
                Response::new(425, "No free passive port available, try again later.")
            }
            DataConnectionError::NotPrepared => Response::new(425, "Use PORT or PASV first."),
            DataConnectionError::Cancelled => {
                Response::new(426, "Connection closed; transfer aborted.")
            }
            DataConnectionError::Timeout(_) | DataConnectionError::Io(_) => {
                Response::new(425, "Can't open data connection.")
            }
        }
    }
}
