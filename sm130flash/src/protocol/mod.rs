//! Protocol implementations.
//!
//! The module speaks two protocols on one serial line: framed commands in
//! normal operation and a raw magic/ack exchange while its bootloader is
//! active. Each has its own handler type that borrows the port mutably, so
//! only one of them can be in use at a time.

pub mod bootloader;
pub mod command;
pub mod frame;

// Re-export common types
pub use bootloader::{BootloaderSession, FlashState};
pub use command::{CommandChannel, send_command};
pub use frame::{Command, Frame, build_frame, checksum};
