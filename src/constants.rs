// src/constants.rs

pub const USERNAME_REGEX: &str = r"^[a-zA-Z0-9._@-]{1,64}$";

// TELNET bytes recognised on the control channel (RFC 854).
pub const IAC: u8 = 0xFF;
pub const DONT: u8 = 0xFE;
pub const DO: u8 = 0xFD;
pub const WONT: u8 = 0xFC;
pub const WILL: u8 = 0xFB;
pub const INTERRUPT_PROCESS: u8 = 0xF4;
pub const DATA_MARK: u8 = 0xF2;

pub const CR: u8 = b'\r';
pub const LF: u8 = b'\n';

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ftpcontrold.conf";
pub const DEFAULT_RESPONSE_QUEUE_CAPACITY: usize = 3;
pub const DEFAULT_MAX_COMMAND_LENGTH: usize = 4096;
pub const READ_BUFFER_SIZE: usize = 1024;
pub const TRANSFER_BUFFER_SIZE: usize = 64 * 1024;
