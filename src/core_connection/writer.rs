use crate::core_ftpcommand::encoding::TextEncoding;
use crate::core_ftpcommand::response::Response;
use log::{debug, trace};
use std::net::SocketAddr;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Why the writer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// Every sender is gone or the connection was cancelled; the queue was flushed.
    Drained,
    /// A `421` was written; nothing after it is sent.
    Fatal,
}

/// Drains the reply queue onto the control socket in order.
///
/// Each reply is encoded with the session encoding current at the time it is
/// written. On cancellation the replies already queued are still written.
pub async fn run_response_writer<W>(
    mut writer: W,
    mut replies: mpsc::Receiver<Response>,
    encoding: watch::Receiver<TextEncoding>,
    cancel: CancellationToken,
    peer: SocketAddr,
) -> std::io::Result<WriterExit>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let response = tokio::select! {
            biased;
            response = replies.recv() => response,
            _ = cancel.cancelled() => replies.try_recv().ok(),
        };
        let Some(response) = response else {
            break;
        };

        let current = *encoding.borrow();
        if write_response(&mut writer, response, current, peer).await? {
            return Ok(WriterExit::Fatal);
        }
    }

    writer.flush().await?;
    Ok(WriterExit::Drained)
}

/// Returns whether the reply was fatal.
async fn write_response<W>(
    writer: &mut W,
    response: Response,
    encoding: TextEncoding,
    peer: SocketAddr,
) -> std::io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    let code = response.code;
    let fatal = response.is_fatal();
    for line in response.render() {
        trace!("[{}] > {}", peer, line);
        let mut bytes = encoding.encode(&line);
        bytes.extend_from_slice(b"\r\n");
        writer.write_all(&bytes).await?;
    }
    writer.flush().await?;
    debug!("[{}] Sent {} reply", peer, code);
    Ok(fatal)
}
