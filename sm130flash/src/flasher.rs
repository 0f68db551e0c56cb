//! SM130 firmware updater.
//!
//! Ties the two protocols together in the order the module expects:
//!
//! 1. wait for the module to come out of reset and drop stale input
//! 2. read the firmware version (framed command `0x81`)
//! 3. run the bootloader session with the image
//! 4. wait for the module to restart and drop stale input
//! 5. read the firmware version again
//!
//! ## Example
//!
//! ```rust,no_run
//! use sm130flash::{FirmwareImage, LogObserver, Sm130Flasher};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let image = FirmwareImage::from_file("sm130.hex")?;
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let mut flasher = Sm130Flasher::open("/dev/ttyUSB0", 19200)?;
//!         let report = flasher.update(&image, LogObserver)?;
//!         println!("{} -> {}", report.version_before, report.version_after);
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::error::Result;
use crate::image::FirmwareImage;
use crate::observer::{UpdateObserver, VersionStage};
use crate::port::Port;
use crate::protocol::bootloader::BootloaderSession;
use crate::protocol::command::CommandChannel;
use log::{debug, info};
use std::thread;
use std::time::Duration;

/// Time the module needs after power-up or a finished update before it
/// answers commands.
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(2);

/// Outcome of a complete update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Version reported before flashing.
    pub version_before: String,
    /// Version reported after flashing.
    pub version_after: String,
    /// Number of chunks written.
    pub chunks_written: usize,
}

/// SM130 flasher.
///
/// Generic over the port type `P`, which must implement the `Port` trait.
pub struct Sm130Flasher<P: Port> {
    port: P,
    reset_delay: Duration,
}

impl<P: Port> Sm130Flasher<P> {
    /// Create a new flasher with an existing port.
    pub fn new(port: P) -> Self {
        Self {
            port,
            reset_delay: DEFAULT_RESET_DELAY,
        }
    }

    /// Set how long to wait for the module to reset.
    #[must_use]
    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the flasher and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Wait for the module to reset, then discard pending input.
    pub fn settle(&mut self) -> Result<()> {
        if !self.reset_delay.is_zero() {
            debug!("Waiting {:?} for the module to reset", self.reset_delay);
            thread::sleep(self.reset_delay);
        }
        self.port.clear_input()
    }

    /// Read the firmware version string.
    pub fn firmware_version(&mut self) -> Result<String> {
        CommandChannel::new(&mut self.port).firmware_version()
    }

    /// Write `image` through the bootloader.
    ///
    /// The port is held by the bootloader session until this returns.
    pub fn flash<O: UpdateObserver>(&mut self, image: &FirmwareImage, observer: O) -> Result<()> {
        info!(
            "Flashing {} chunks ({} bytes) on {}",
            image.len(),
            image.total_bytes(),
            self.port.name()
        );
        BootloaderSession::new(&mut self.port, image).run(observer)
    }

    /// Full update: version, flash, version.
    ///
    /// Any failure ends the update at once. In particular, the second version
    /// query is only made after a successful flash.
    pub fn update<O: UpdateObserver>(
        &mut self,
        image: &FirmwareImage,
        mut observer: O,
    ) -> Result<UpdateReport> {
        self.settle()?;
        let version_before = self.firmware_version()?;
        observer.report_version(VersionStage::BeforeUpdate, &version_before);

        self.flash(image, &mut observer)?;

        self.settle()?;
        let version_after = self.firmware_version()?;
        observer.report_version(VersionStage::AfterUpdate, &version_after);

        Ok(UpdateReport {
            version_before,
            version_after,
            chunks_written: image.len(),
        })
    }

    /// Release the port.
    pub fn close(&mut self) {
        if let Err(e) = self.port.close() {
            debug!("Error closing {}: {e}", self.port.name());
        }
    }
}

// Native-specific convenience functions
#[cfg(feature = "native")]
mod native_impl {
    use super::{Result, Sm130Flasher, info};
    use crate::port::NativePort;

    impl Sm130Flasher<NativePort> {
        /// Open a serial port and create a flasher on it.
        ///
        /// # Arguments
        ///
        /// * `port_name` - Serial port name (e.g., "/dev/ttyUSB0" or "COM3")
        /// * `baud_rate` - Baud rate of the module's serial interface
        pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
            info!("Opening {port_name} at {baud_rate} baud");
            let port = NativePort::open_simple(port_name, baud_rate)?;
            Ok(Self::new(port))
        }
    }
}
