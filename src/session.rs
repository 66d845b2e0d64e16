use crate::core_ftpcommand::encoding::TextEncoding;
use crate::core_network::data_connection::DataConnectionFeature;
use std::path::PathBuf;

/// Representation type set by `TYPE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferType {
    #[default]
    Ascii,
    Image,
    /// `TYPE L <byte size>`
    Local(u8),
}

/// Per-connection settings that handlers read and write.
///
/// Shared between the connection driver and a running background command, so it
/// lives behind a `tokio::sync::Mutex`; hold the lock only briefly.
#[derive(Debug)]
pub struct Session {
    /// File-system binding for transfers.
    pub root: PathBuf,
    pub username: Option<String>,
    pub encoding: TextEncoding,
    pub transfer_type: TransferType,
    pub data_connection: DataConnectionFeature,
}

impl Session {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            username: None,
            encoding: TextEncoding::default(),
            transfer_type: TransferType::default(),
            data_connection: DataConnectionFeature::new(),
        }
    }

    /// State right after the greeting, as required by `REIN`. A pending passive
    /// listener is closed and its port returned.
    pub fn reset(&mut self) {
        self.username = None;
        self.encoding = TextEncoding::default();
        self.transfer_type = TransferType::default();
        self.data_connection.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_network::data_connection::DataCommand;

    #[test]
    fn reset_clears_everything_but_root() {
        let mut session = Session::new(PathBuf::from("/srv/ftp"));
        session.username = Some("alice".into());
        session.encoding = TextEncoding::Latin1;
        session.transfer_type = TransferType::Image;
        session.data_connection.set_epsv_all();
        session
            .data_connection
            .set_active(DataCommand::Eprt, "127.0.0.1:4000".parse().unwrap());

        session.reset();

        assert_eq!(session.root, PathBuf::from("/srv/ftp"));
        assert!(session.username.is_none());
        assert_eq!(session.encoding, TextEncoding::Utf8);
        assert_eq!(session.transfer_type, TransferType::Ascii);
        assert!(!session.data_connection.epsv_all());
        assert!(!session.data_connection.has_pending());
    }
}
