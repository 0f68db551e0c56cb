//! Flash and version command implementations.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use sm130flash::{
    FirmwareImage, FlashState, NativePort, Sm130Flasher, UpdateObserver, VersionStage,
};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::{Cli, use_fancy_output};

/// Renders update progress on stderr.
struct ProgressObserver {
    pb: ProgressBar,
    quiet: bool,
}

impl ProgressObserver {
    fn new(quiet: bool, chunks: usize) -> Self {
        let pb = if quiet || !use_fancy_output() {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(chunks as u64);
            #[allow(clippy::unwrap_used)] // Static template string
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb.set_draw_target(ProgressDrawTarget::stderr());
            pb
        };
        Self { pb, quiet }
    }
}

impl UpdateObserver for ProgressObserver {
    fn report_progress(&mut self, written: usize, total: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_position(written as u64);
    }

    fn report_version(&mut self, stage: VersionStage, version: &str) {
        if self.quiet {
            return;
        }
        self.pb.suspend(|| {
            eprintln!(
                "{} Firmware version {stage}: {}",
                style("ℹ").blue(),
                style(version).cyan()
            );
        });
    }

    fn report_state(&mut self, state: &FlashState) {
        let message = match state {
            FlashState::AwaitingEntryAck => "Entering bootloader",
            FlashState::AwaitingStartAck => "Starting transfer",
            FlashState::Transferring { .. } => "Writing",
            FlashState::Finalizing | FlashState::AwaitingFinalizeAck => "Finalizing",
            _ => return,
        };
        self.pb.set_message(message);
    }
}

/// Open the configured port.
fn open_flasher(
    cli: &Cli,
    config: &Config,
    reset_delay: Duration,
) -> Result<Sm130Flasher<NativePort>> {
    let port = cli.resolve_port(config)?;
    let baud = cli.resolve_baud(config);
    if !cli.quiet {
        eprintln!("{} Using {port} at {baud} baud", style("🔌").cyan());
    }

    let flasher = Sm130Flasher::open(&port, baud)
        .with_context(|| format!("Failed to open serial port {port}"))?;
    Ok(flasher.with_reset_delay(reset_delay))
}

/// Flash command implementation.
pub(crate) fn cmd_flash(
    cli: &Cli,
    config: &Config,
    image_path: &Path,
    reset_delay: Duration,
) -> Result<()> {
    if !cli.quiet {
        eprintln!(
            "{} Loading firmware image {}",
            style("📦").cyan(),
            image_path.display()
        );
    }

    let image = FirmwareImage::from_file(image_path)
        .with_context(|| format!("Failed to load firmware image {}", image_path.display()))?;

    if !cli.quiet {
        eprintln!(
            "{} {} chunks, {} bytes",
            style("ℹ").blue(),
            image.len(),
            image.total_bytes()
        );
    }

    let mut flasher = open_flasher(cli, config, reset_delay)?;

    if !cli.quiet {
        eprintln!("{} Waiting for the module to reset", style("⏳").yellow());
    }

    let mut observer = ProgressObserver::new(cli.quiet, image.len());
    let result = flasher.update(&image, &mut observer);

    // Close the flasher to release the serial port
    flasher.close();

    let report = match result {
        Ok(report) => {
            observer.pb.finish_with_message("Complete");
            report
        },
        Err(err) => {
            observer.pb.abandon();
            return Err(err).context("Firmware update failed");
        },
    };

    if !cli.quiet {
        eprintln!(
            "\n{} Firmware updated: {} -> {} ({} chunks written)",
            style("🎉").green().bold(),
            report.version_before,
            style(&report.version_after).bold(),
            report.chunks_written
        );
    }

    Ok(())
}

/// Version command implementation.
///
/// The version string goes to stdout, everything else to stderr.
pub(crate) fn cmd_version(cli: &Cli, config: &Config, reset_delay: Duration) -> Result<()> {
    let mut flasher = open_flasher(cli, config, reset_delay)?;

    let result = flasher
        .settle()
        .and_then(|()| flasher.firmware_version());
    flasher.close();

    let version = result.context("Failed to read firmware version")?;
    println!("{version}");

    Ok(())
}
