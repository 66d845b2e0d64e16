use anyhow::{Context, Result};
use clap::Parser;
use ftpcontrold::constants::DEFAULT_CONFIG_PATH;
use ftpcontrold::core_auth::{Authenticator, PasswdAuthenticator};
use ftpcontrold::core_cli::Cli;
use ftpcontrold::core_ftpcommand::handlers::initialize_command_handlers;
use ftpcontrold::core_log::logger::init_logger;
use ftpcontrold::{Config, FtpServer, ServerContext};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logger(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }
    log_config(&config);

    let authenticator = build_authenticator(&config)?;
    let context = ServerContext::new(config, initialize_command_handlers(), authenticator)
        .context("Failed to build server")?;
    let server = FtpServer::new(context);
    server.start().await.context("Failed to start server")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    server.stop().await;
    Ok(())
}

/// An explicit path must exist; the default one is optional.
fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load_from_file(DEFAULT_CONFIG_PATH),
        None => {
            warn!("No configuration at {}, using defaults", DEFAULT_CONFIG_PATH);
            Ok(Config::default())
        }
    }
}

fn build_authenticator(config: &Config) -> Result<Arc<dyn Authenticator>> {
    let anonymous = config.auth.anonymous;
    let authenticator = match &config.auth.passwd_file {
        Some(path) => PasswdAuthenticator::load(path, anonymous)
            .with_context(|| format!("Failed to load users from {}", path.display()))?,
        None => PasswdAuthenticator::new(Vec::new(), anonymous),
    };
    Ok(Arc::new(authenticator))
}

fn log_config(config: &Config) {
    info!("  Listen Address: {}:{}", config.server.listen_address, config.server.listen_port);
    match (config.pasv.min_port, config.pasv.max_port) {
        (Some(min), Some(max)) => info!("  Passive Ports: {}-{}", min, max),
        _ => info!("  Passive Ports: any"),
    }
    if let Some(addr) = config.pasv.public_address {
        info!("  PASV Address: {}", addr);
    }
    info!("  Storage Root: {}", config.storage.root.display());
    info!("  Anonymous Login: {}", config.auth.anonymous);
    info!("  Idle Timeout: {}s", config.server.idle_timeout_secs);
}
