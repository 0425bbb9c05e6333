use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize logging/tracing for the bot.
///
/// `level` is the configured default (e.g. `INFO`, `debug`). `RUST_LOG` wins
/// when set. Logs go to stderr so stdout stays free for the operator prompt.
pub fn init(service_name: &str, level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(service_name, level)))
        .map_err(|e| Error::Config(format!("invalid log level {level:?}: {e}")))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::External(format!("logging already initialized: {e}")))?;

    Ok(())
}

fn default_directives(service_name: &str, level: &str) -> String {
    let level = level.trim().to_lowercase();
    // Default: the configured level for our crates, warn for everything else.
    format!("warn,{service_name}={level},zap_core={level},zap_whatsapp={level}")
}
