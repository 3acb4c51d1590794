//! Prism - game server supervisor with a command API and event webhooks.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use prism::app::{Prism, RunOptions};
use prism::config::{ConfigError, ConfigLoader, LogLevel, PrismConfig};

#[derive(Parser)]
#[command(
    name = "prism",
    about = "Game server supervisor with a command API and event webhooks",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Supervise the game server.
    Run {
        /// Config file (default: ./prism.toml, then the user config dir).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Do not start the game automatically.
        #[arg(long)]
        no_start: bool,
        /// Do not read operator commands from stdin.
        #[arg(long)]
        no_console: bool,
    },
    /// Load and validate the configuration, then print it.
    CheckConfig {
        /// Config file (default: ./prism.toml, then the user config dir).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<PrismConfig, ConfigError> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = loader.load()?;
    config.validate()?;
    Ok(config)
}

fn init_tracing(level: LogLevel, verbosity: u8, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let level = level.raised(verbosity);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().map_or_else(
                || std::ffi::OsString::from("prism.log"),
                std::ffi::OsStr::to_os_string,
            );
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            no_start,
            no_console,
        } => {
            let config = match load_config(config) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return ExitCode::FAILURE;
                }
            };
            let _guard = init_tracing(config.level, cli.verbose, config.log_file.as_deref());

            tracing::info!(
                start_cmd = %config.shell.start_cmd,
                api = config.api.enabled,
                webhooks = config.webhooks.len(),
                "Starting prism"
            );

            let options = RunOptions {
                autostart: !no_start,
                console: !no_console,
            };
            let result = match Prism::new(config) {
                Ok(prism) => prism.run(options).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "Prism exited with error");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::CheckConfig { config } => {
            let config = match load_config(config) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return ExitCode::FAILURE;
                }
            };
            match toml::to_string_pretty(&config) {
                Ok(text) => {
                    println!("{text}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Error: failed to render configuration: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
