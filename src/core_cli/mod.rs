use clap::Parser;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "ftpcontrold", about = "An FTP control connection server written in Rust.")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Listen port, overrides the configuration file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from(["ftpcontrold", "-c", "/tmp/x.conf", "--port", "2100", "-v"]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/x.conf"));
        assert_eq!(cli.port, Some(2100));
        assert!(cli.verbose);

        let cli = Cli::parse_from(["ftpcontrold"]);
        assert!(cli.config.is_none() && cli.port.is_none() && !cli.verbose);
    }
}
