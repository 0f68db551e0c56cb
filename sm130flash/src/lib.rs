//! # sm130flash
//!
//! A library for talking to SM130 RFID modules and updating their firmware.
//!
//! This crate provides:
//!
//! - the framed command protocol (`FF 00 LEN CODE PAYLOAD CSUM`)
//! - firmware image loading from the line based hex text format
//! - the bootloader update sequence as an explicit state machine
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//!
//! The protocol handlers only require `Read + Write`, so any byte stream can
//! stand in for a serial port.
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use sm130flash::{FirmwareImage, LogObserver};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load the image
//!     let image = FirmwareImage::from_file("sm130.hex")?;
//!
//!     // Open the module and update it (native only)
//!     #[cfg(feature = "native")]
//!     {
//!         let mut flasher = sm130flash::Sm130Flasher::open("/dev/ttyUSB0", 19200)?;
//!         let report = flasher.update(&image, LogObserver)?;
//!         println!("Updated {} -> {}", report.version_before, report.version_after);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flasher;
pub mod image;
pub mod observer;
pub mod port;
pub mod protocol;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    error::{Error, FlashStep, Result},
    flasher::{DEFAULT_RESET_DELAY, Sm130Flasher, UpdateReport},
    image::{FirmwareImage, ImageSummary},
    observer::{LogObserver, NullObserver, UpdateObserver, VersionStage},
    port::{DEFAULT_BAUD, Port, SerialConfig},
    protocol::{
        BootloaderSession, Command, CommandChannel, FlashState, Frame, build_frame, checksum,
        send_command,
    },
};
