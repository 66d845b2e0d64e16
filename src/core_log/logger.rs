use chrono::Local;
use env_logger::{Builder, Env};
use std::io::Write;

/// Installs the global logger: `[timestamp] [LEVEL] message`. `RUST_LOG` wins
/// over the default level; `verbose` lowers the default to debug.
pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .try_init();
}
