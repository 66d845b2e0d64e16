// Control channel framing, replies and the built-in FTP commands
pub mod collector;
pub mod command;
pub mod encoding;
pub mod handler;
pub mod handlers;
pub mod response;
pub mod telnet;

// Here's the list of the FTP commands implemented
pub mod auth;
pub mod feat;
pub mod help;
pub mod noop;
pub mod opts;
pub mod pass;
pub mod pasv;
pub mod port;
pub mod quit;
pub mod retr;
pub mod stor;
pub mod syst;
pub mod type_;
pub mod user;

pub use command::FtpCommand;
pub use handler::{CommandContext, CommandHandler, CommandRequest, HandlerError, HandlerRegistry};
pub use response::Response;
