use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

/// The filter used when `RUST_LOG` is unset.
pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Build the filter: `RUST_LOG` if set, otherwise `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging in the given format.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init(format: LogFormat, default_level: &str) {
    match format {
        LogFormat::Human => init_logging(default_level),
        LogFormat::Json => init_logging_json(default_level),
    }
}

/// Human-readable output for an interactive terminal.
pub fn init_logging(default_level: &str) {
    fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false)
        .with_level(true)
        .try_init()
        .ok();

    tracing::debug!("logging initialised (human-readable)");
}

/// One JSON object per line.
pub fn init_logging_json(default_level: &str) {
    fmt()
        .json()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .try_init()
        .ok();

    tracing::debug!("logging initialised (json)");
}
