#![allow(dead_code)]

use ftpcontrold::core_auth::PasswdAuthenticator;
use ftpcontrold::core_ftpcommand::handler::HandlerRegistry;
use ftpcontrold::core_ftpcommand::handlers::initialize_command_handlers;
use ftpcontrold::{Config, FtpServer, ServerContext};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_ROOT: AtomicUsize = AtomicUsize::new(0);

/// A fresh, empty storage root per test.
pub fn storage_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "ftpcontrold-test-{}-{}",
        std::process::id(),
        NEXT_ROOT.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(&root).unwrap();
    root
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.listen_address = "127.0.0.1".parse().unwrap();
    config.server.listen_port = 0;
    config.server.data_connection_timeout_secs = 10;
    config.storage.root = storage_root();
    config
}

pub async fn start_with(context: ServerContext) -> (FtpServer, SocketAddr) {
    let server = FtpServer::new(context);
    let addr = server.start().await.unwrap();
    (server, addr)
}

pub fn context_with(config: Config, handlers: HandlerRegistry) -> ServerContext {
    ServerContext::new(
        config,
        handlers,
        Arc::new(PasswdAuthenticator::anonymous_only()),
    )
    .unwrap()
}

pub async fn start_server(configure: impl FnOnce(&mut Config)) -> (FtpServer, SocketAddr) {
    let mut config = test_config();
    configure(&mut config);
    start_with(context_with(config, initialize_command_handlers())).await
}

/// A line-oriented FTP control client.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Connects and consumes the greeting.
    pub async fn connect_ready(addr: SocketAddr) -> Self {
        let mut client = Self::connect(addr).await;
        assert_eq!(client.reply().await.0, 220);
        client
    }

    pub async fn login(addr: SocketAddr) -> Self {
        let mut client = Self::connect_ready(addr).await;
        assert_eq!(client.cmd("USER anonymous").await.0, 331);
        assert_eq!(client.cmd("PASS guest@example.com").await.0, 230);
        client
    }

    pub async fn send(&mut self, line: &str) {
        self.send_raw(format!("{}\r\n", line).as_bytes()).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn read_line(&mut self) -> Option<String> {
        let mut line = Vec::new();
        let n = tokio::time::timeout(REPLY_TIMEOUT, self.reader.read_until(b'\n', &mut line))
            .await
            .expect("timed out waiting for a reply")
            .unwrap_or(0);
        if n == 0 {
            return None;
        }
        Some(String::from_utf8_lossy(&line).trim_end().to_string())
    }

    /// Reads one complete reply; returns the code and every line's text.
    pub async fn reply_lines(&mut self) -> (u16, Vec<String>) {
        let first = self.read_line().await.expect("connection closed");
        let code: u16 = first[..3].parse().unwrap();
        let mut lines = vec![first[4..].to_string()];
        if first.as_bytes().get(3) == Some(&b'-') {
            let last_prefix = format!("{} ", code);
            loop {
                let line = self.read_line().await.expect("connection closed");
                if let Some(text) = line.strip_prefix(&last_prefix) {
                    lines.push(text.to_string());
                    break;
                }
                lines.push(line.trim_start().to_string());
            }
        }
        (code, lines)
    }

    /// Reads one reply; returns the code and the last line's text.
    pub async fn reply(&mut self) -> (u16, String) {
        let (code, mut lines) = self.reply_lines().await;
        (code, lines.pop().unwrap_or_default())
    }

    pub async fn cmd(&mut self, line: &str) -> (u16, String) {
        self.send(line).await;
        self.reply().await
    }

    /// Asserts nothing arrives for `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) {
        let mut line = Vec::new();
        let read = tokio::time::timeout(wait, self.reader.read_until(b'\n', &mut line)).await;
        assert!(read.is_err(), "unexpected data: {:?}", String::from_utf8_lossy(&line));
    }

    pub async fn expect_closed(&mut self) {
        assert_eq!(self.read_line().await, None);
    }
}

/// Port from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).` text.
pub fn pasv_port(text: &str) -> u16 {
    let inner = &text[text.find('(').unwrap() + 1..text.find(')').unwrap()];
    let fields: Vec<u16> = inner.split(',').map(|f| f.trim().parse().unwrap()).collect();
    fields[4] * 256 + fields[5]
}

/// Port from a `229 Entering Extended Passive Mode (|||port|).` text.
pub fn epsv_port(text: &str) -> u16 {
    let inner = &text[text.find("(|||").unwrap() + 4..];
    inner[..inner.find('|').unwrap()].parse().unwrap()
}

/// Polls `check` until it holds or a few seconds have passed.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
