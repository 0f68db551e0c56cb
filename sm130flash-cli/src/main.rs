//! sm130flash CLI - Command-line tool for updating SM130 RFID module firmware.
//!
//! ## Features
//!
//! - Update module firmware from a hex text image
//! - Query the running firmware version
//! - Inspect firmware images (human readable or JSON)
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use log::debug;
use sm130flash::{DEFAULT_BAUD, DEFAULT_RESET_DELAY};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod config;

use commands::flash::{cmd_flash, cmd_version};
use commands::info::cmd_info;
use config::Config;

/// Errors raised by the front end itself rather than the library.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Required input is missing or inconsistent.
    #[error("{0}")]
    Usage(String),
}

/// Process exit code for an error returned by a command.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<CliError>() {
        Some(CliError::Usage(_)) => 2,
        None => 1,
    }
}

/// Check if progress bars and colors should be used.
pub(crate) fn use_fancy_output() -> bool {
    console::Term::stderr().is_term() && console::colors_enabled_stderr()
}

/// sm130flash - Update the firmware of SM130 RFID modules.
///
/// Environment variables:
///   SM130_PORT   - Default serial port
///   SM130_BAUD   - Default baud rate (default: 19200)
#[derive(Parser)]
#[command(name = "sm130flash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Serial port the module is attached to.
    #[arg(short, long, global = true, env = "SM130_PORT")]
    port: Option<String>,

    /// Baud rate of the module's serial interface [default: 19200].
    #[arg(short, long, global = true, env = "SM130_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Update the module firmware from an image file.
    Flash {
        /// Path to the firmware image.
        image: PathBuf,

        /// Time the module needs to reset, in milliseconds [default: 2000].
        #[arg(long, value_name = "MS")]
        reset_delay_ms: Option<u64>,
    },

    /// Print the firmware version of the module.
    Version,

    /// Show information about a firmware image.
    Info {
        /// Path to the firmware image.
        image: PathBuf,

        /// Output information as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Serial port from the command line, environment or config.
    pub(crate) fn resolve_port(&self, config: &Config) -> Result<String> {
        self.port
            .clone()
            .or_else(|| config.connection.serial.clone())
            .ok_or_else(|| {
                CliError::Usage(
                    "No serial port given. Use --port or set SM130_PORT.".to_string(),
                )
                .into()
            })
    }

    /// Baud rate from the command line, environment or config.
    pub(crate) fn resolve_baud(&self, config: &Config) -> u32 {
        self.baud.or(config.connection.baud).unwrap_or(DEFAULT_BAUD)
    }
}

/// Reset delay from the command line or config.
pub(crate) fn resolve_reset_delay(flag_ms: Option<u64>, config: &Config) -> Duration {
    flag_ms
        .map(Duration::from_millis)
        .or_else(|| config.flash.reset_delay())
        .unwrap_or(DEFAULT_RESET_DELAY)
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Flash {
            image,
            reset_delay_ms,
        } => cmd_flash(
            cli,
            &config,
            image,
            resolve_reset_delay(*reset_delay_ms, &config),
        ),
        Commands::Version => cmd_version(cli, &config, resolve_reset_delay(None, &config)),
        Commands::Info { image, json } => cmd_info(image, *json),
    }
}

fn main() {
    // Respect NO_COLOR and plain pipes
    if env::var_os("NO_COLOR").is_some() || !console::Term::stderr().is_term() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(&cli);

    debug!(
        "sm130flash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code(&err));
    }
}
