use crate::constants::TRANSFER_BUFFER_SIZE;
use crate::core_ftpcommand::handler::HandlerError;
use crate::session::Session;
use log::warn;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Turns a client supplied path into a relative one with no `..`, `.` or root
/// components. Returns `None` when the path tries to climb out.
pub fn sanitize_input(input: &str) -> Option<PathBuf> {
    let mut sanitized = PathBuf::new();
    for component in Path::new(input.trim()).components() {
        match component {
            Component::Normal(part) => sanitized.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => return None,
        }
    }
    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Resolves a transfer argument against the session's file-system binding.
pub fn resolve_path(session: &Session, arg: &str) -> Result<PathBuf, HandlerError> {
    match sanitize_input(arg) {
        Some(relative) => Ok(session.root.join(relative)),
        None => {
            warn!("Rejected path argument: {:?}", arg);
            Err(HandlerError::ftp(553, "Requested action not taken. File name not allowed."))
        }
    }
}

/// Copies `reader` into `writer` until EOF, or stops early on cancellation.
/// An I/O failure on either side ends the transfer with `426`.
pub async fn copy_until_cancelled<R, W>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<u64, HandlerError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut reader = BufReader::with_capacity(TRANSFER_BUFFER_SIZE, reader);
    let copied = tokio::select! {
        _ = cancel.cancelled() => return Err(HandlerError::Cancelled),
        copied = tokio::io::copy_buf(&mut reader, writer) => copied,
    };
    let copied = match copied {
        Ok(n) => writer.flush().await.map(|_| n),
        Err(e) => Err(e),
    };
    copied.map_err(|e| {
        warn!("Transfer failed: {}", e);
        HandlerError::ftp(426, "Connection closed; transfer aborted.")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_roots_and_dots() {
        assert_eq!(sanitize_input("/pub/./file.txt"), Some(PathBuf::from("pub/file.txt")));
        assert_eq!(sanitize_input("file.txt"), Some(PathBuf::from("file.txt")));
        assert_eq!(sanitize_input("../etc/passwd"), None);
        assert_eq!(sanitize_input("pub/../../etc"), None);
        assert_eq!(sanitize_input("/"), None);
        assert_eq!(sanitize_input("   "), None);
    }

    #[test]
    fn resolve_stays_under_root() {
        let session = Session::new(PathBuf::from("/srv/ftp"));
        assert_eq!(
            resolve_path(&session, "/a/b").unwrap(),
            PathBuf::from("/srv/ftp/a/b")
        );
        let err = resolve_path(&session, "../x").unwrap_err();
        assert_eq!(err.to_ftp_response().code, 553);
    }

    #[tokio::test]
    async fn copy_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        let mut data: &[u8] = b"hello";
        let mut out = Vec::new();
        assert_eq!(copy_until_cancelled(&mut data, &mut out, &cancel).await.unwrap(), 5);
        assert_eq!(out, b"hello");

        // A reader that never ends.
        let (mut reader, _writer) = tokio::io::duplex(64);
        cancel.cancel();
        let result = copy_until_cancelled(&mut reader, &mut out, &cancel).await;
        assert!(matches!(result, Err(HandlerError::Cancelled)));
    }
}
