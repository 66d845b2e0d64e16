// One control connection: read loop, reply writer and background command
pub mod background;
pub mod driver;
pub mod writer;

pub use driver::{run_connection, CloseReason, ConnectionState, ConnectionSummary};
