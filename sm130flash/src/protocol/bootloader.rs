//! SM130 bootloader update sequence.
//!
//! While flashing, the module does not speak the framed command protocol.
//! The host writes fixed magic sequences and raw image chunks, and the
//! bootloader answers each write with fixed acknowledgement bytes:
//!
//! ```text
//! host                                   module
//!  |-- FF 00 01 95 96 --------------------->|  enter bootloader
//!  |<-------------------- FF 00 02 95 00 FF-|
//!  |-- FF 38 AA 55 33 68 98 0B ------------>|  start transfer
//!  |<--------------------------------- 20 --|
//!  |-- chunk 0 ---------------------------->|
//!  |<--------------------------------- 20 --|
//!  |   ...                                  |
//!  |-- FF 3B AA 55 33 68 98 0B 00 .. 00 --->|  finalize (78 bytes)
//!  |<--------------------------------- 21 --|
//! ```
//!
//! Every answer is compared byte for byte. The first mismatch or transport
//! error ends the session in [`FlashState::Failed`]; nothing further is
//! written and the device is left in whatever state it reached.

use std::io::{Read, Write};

use log::{debug, error, info};

use crate::error::{Error, FlashStep, Result};
use crate::image::FirmwareImage;
use crate::observer::UpdateObserver;
use crate::port::{read_vec, write_fully};

/// Switches the module from command mode into the bootloader.
pub const ENTER_BOOTLOADER: [u8; 5] = [0xFF, 0x00, 0x01, 0x95, 0x96];

/// Full reply confirming bootloader entry.
pub const ENTER_BOOTLOADER_ACK: [u8; 6] = [0xFF, 0x00, 0x02, 0x95, 0x00, 0xFF];

/// Announces the start of the image transfer.
pub const START_TRANSFER: [u8; 8] = [0xFF, 0x38, 0xAA, 0x55, 0x33, 0x68, 0x98, 0x0B];

/// Leading bytes of the finalize sequence.
pub const FINALIZE_MAGIC: [u8; 8] = [0xFF, 0x3B, 0xAA, 0x55, 0x33, 0x68, 0x98, 0x0B];

/// Length of the finalize sequence after zero padding.
pub const FINALIZE_LEN: usize = 0x4E;

/// Acknowledges the transfer start and every chunk.
pub const ACK_CHUNK: u8 = 0x20;

/// Acknowledges the finalize sequence.
pub const ACK_FINALIZED: u8 = 0x21;

/// Finalize magic right-padded with zeros to [`FINALIZE_LEN`] bytes.
pub const fn finalize_sequence() -> [u8; FINALIZE_LEN] {
    let mut seq = [0u8; FINALIZE_LEN];
    let mut i = 0;
    while i < FINALIZE_MAGIC.len() {
        seq[i] = FINALIZE_MAGIC[i];
        i += 1;
    }
    seq
}

/// State of an update session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashState {
    /// Nothing written yet.
    Idle,
    /// Bootloader entry sent, waiting for its 6-byte reply.
    AwaitingEntryAck,
    /// Bootloader is active.
    EntryConfirmed,
    /// Transfer start sent, waiting for its ack.
    AwaitingStartAck,
    /// Next chunk to write is `index` (equal to `total` once all are sent).
    Transferring {
        /// Index of the next chunk.
        index: usize,
        /// Number of chunks in the image.
        total: usize,
    },
    /// All chunks acknowledged, finalize not yet sent.
    Finalizing,
    /// Finalize sent, waiting for its ack.
    AwaitingFinalizeAck,
    /// Update finished successfully.
    Done,
    /// Update aborted at the given step; device state is unknown.
    Failed(FlashStep),
}

impl FlashState {
    /// Whether the session can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Step of the sequence this state belongs to.
    pub fn step(&self) -> FlashStep {
        match *self {
            Self::Idle | Self::AwaitingEntryAck => FlashStep::BootloaderEntry,
            Self::EntryConfirmed | Self::AwaitingStartAck => FlashStep::TransferStart,
            Self::Transferring { index, .. } => FlashStep::Chunk(index),
            Self::Finalizing | Self::AwaitingFinalizeAck | Self::Done => FlashStep::Finalize,
            Self::Failed(step) => step,
        }
    }
}

/// Bootloader protocol bound to a borrowed port and the image it writes.
///
/// The session holds the port mutably for its whole life, so the framed
/// command protocol cannot run on the same port until it ends.
pub struct BootloaderSession<'a, P: Read + Write + ?Sized> {
    port: &'a mut P,
    image: &'a FirmwareImage,
    state: FlashState,
}

impl<'a, P: Read + Write + ?Sized> BootloaderSession<'a, P> {
    /// Start a session for `image` in [`FlashState::Idle`].
    pub fn new(port: &'a mut P, image: &'a FirmwareImage) -> Self {
        Self {
            port,
            image,
            state: FlashState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> &FlashState {
        &self.state
    }

    /// Drive the session from its current state to a terminal one.
    ///
    /// Returns `Ok` once the finalize ack arrives. On failure the session is
    /// left in [`FlashState::Failed`] and the error names the step. Calling
    /// this on a session that already failed returns an error for the same
    /// step without touching the port.
    pub fn run<O: UpdateObserver>(&mut self, mut observer: O) -> Result<()> {
        loop {
            match self.state {
                FlashState::Done => return Ok(()),
                FlashState::Failed(step) => return Err(Error::SessionFailed { step }),
                _ => self.step(&mut observer)?,
            }
        }
    }

    /// Perform one transition. Terminal states are left unchanged.
    pub fn step<O: UpdateObserver>(&mut self, mut observer: O) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }

        match self.advance(&mut observer) {
            Ok(next) => {
                self.state = next;
                observer.report_state(&self.state);
                Ok(())
            },
            Err(e) => {
                let step = self.state.step();
                error!("Update aborted at {step}: {e}");
                self.state = FlashState::Failed(step);
                observer.report_state(&self.state);
                Err(e)
            },
        }
    }

    fn advance<O: UpdateObserver>(&mut self, observer: &mut O) -> Result<FlashState> {
        let next = match self.state {
            FlashState::Idle => {
                info!("Enabling update mode.");
                write_fully(&mut *self.port, &ENTER_BOOTLOADER)?;
                FlashState::AwaitingEntryAck
            },
            FlashState::AwaitingEntryAck => {
                let reply = read_vec(&mut *self.port, ENTER_BOOTLOADER_ACK.len())?;
                expect(FlashStep::BootloaderEntry, &ENTER_BOOTLOADER_ACK, reply)?;
                FlashState::EntryConfirmed
            },
            FlashState::EntryConfirmed => {
                info!("Beginning update.");
                write_fully(&mut *self.port, &START_TRANSFER)?;
                FlashState::AwaitingStartAck
            },
            FlashState::AwaitingStartAck => {
                self.expect_ack(FlashStep::TransferStart, ACK_CHUNK)?;
                FlashState::Transferring {
                    index: 0,
                    total: self.image.len(),
                }
            },
            FlashState::Transferring { index, total } if index < total => {
                let chunk = &self.image.chunks()[index];
                debug!("Writing chunk {index} ({} bytes)", chunk.len());
                write_fully(&mut *self.port, chunk)?;
                self.expect_ack(FlashStep::Chunk(index), ACK_CHUNK)?;
                observer.report_progress(index + 1, total);
                FlashState::Transferring {
                    index: index + 1,
                    total,
                }
            },
            FlashState::Transferring { .. } => FlashState::Finalizing,
            FlashState::Finalizing => {
                info!("Finalizing update.");
                write_fully(&mut *self.port, &finalize_sequence())?;
                FlashState::AwaitingFinalizeAck
            },
            FlashState::AwaitingFinalizeAck => {
                self.expect_ack(FlashStep::Finalize, ACK_FINALIZED)?;
                info!("Update complete.");
                FlashState::Done
            },
            FlashState::Done | FlashState::Failed(_) => self.state.clone(),
        };
        Ok(next)
    }

    fn expect_ack(&mut self, step: FlashStep, ack: u8) -> Result<()> {
        let reply = read_vec(&mut *self.port, 1)?;
        expect(step, &[ack], reply)
    }
}

fn expect(step: FlashStep, expected: &[u8], actual: Vec<u8>) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::UnexpectedAcknowledgement {
            step,
            expected: expected.to_vec(),
            actual,
        })
    }
}
