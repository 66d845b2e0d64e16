// Control listener and data connection negotiation (PORT, EPRT, PASV, EPSV)
pub mod address;
pub mod data_connection;
pub mod error;
pub mod network;
pub mod pasv;
pub mod port;
pub mod port_pool;

pub use address::AddressFamily;
pub use data_connection::{DataCommand, DataConnection, DataConnectionFeature};
pub use error::DataConnectionError;
pub use pasv::{ConfigPasvResolver, PasvOptions, PasvOptionsResolver};
pub use port_pool::{PortLease, PortPool, PortPools};
