mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ts_sync::ShutdownSignal;
use ts_telemetry::logging::{self, LogFormat};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// theme -- sync a local theme directory with the theme file API.
#[derive(Parser)]
#[command(name = "theme", version, about)]
struct Cli {
    /// Authorization token (overrides config files and THEME_AUTHORIZATION).
    #[arg(long, global = true)]
    authorization: Option<String>,

    /// Config file to use instead of ~/.config/theme-sync/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every remote file into a local directory.
    Download {
        /// Destination directory.
        #[arg(long, default_value = "theme")]
        path: PathBuf,
        /// Concurrent downloads (default from config).
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Watch a directory and push local changes to the remote store.
    Watch {
        /// Directory to watch.
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Debounce window in milliseconds (default from config).
        #[arg(long)]
        debounce_ms: Option<u64>,
        /// Concurrent remote operations per change set (default from config).
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Human
    };
    logging::init(format, logging::default_level(cli.verbose));

    let settings = match commands::resolve(cli.authorization.as_deref(), cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Download { path, workers } => {
            commands::download::run(&settings, &path, workers).await?;
        }
        Commands::Watch {
            path,
            debounce_ms,
            workers,
        } => {
            let shutdown = ShutdownSignal::new();
            shutdown.trigger_on_ctrl_c();
            let overrides = commands::watch::Overrides {
                debounce_ms,
                workers,
            };
            commands::watch::run(&settings, &path, overrides, &shutdown).await?;
        }
    }

    Ok(())
}
