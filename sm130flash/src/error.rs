//! Error types for sm130flash.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for sm130flash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sm130flash operations.
///
/// Every variant is fatal for the operation that produced it. Nothing in this
/// crate retries or resumes after an error.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure on the transport (including a premature end of stream)
    /// or while reading an image file.
    #[error("I/O error: {0}")]
    Transport(#[from] io::Error),

    /// Serial port could not be opened or configured.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Response frame checksum does not match its contents.
    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch {
        /// Checksum recomputed from the received bytes.
        expected: u8,
        /// Checksum byte transmitted by the device.
        actual: u8,
    },

    /// Response answers a different command than the one sent.
    #[error("Unexpected response code: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedResponseCode {
        /// Command code that was sent.
        expected: u8,
        /// Command code the response claims to answer.
        actual: u8,
    },

    /// Response frame has a bad header, reserved or length byte.
    #[error("Malformed frame {field}: expected {expected}, got {actual:#04x}")]
    MalformedFrameHeader {
        /// Name of the offending field.
        field: &'static str,
        /// Human readable description of the accepted value(s).
        expected: &'static str,
        /// Byte actually received.
        actual: u8,
    },

    /// Bootloader answered a flashing step with the wrong bytes.
    #[error(
        "Unexpected acknowledgement during {step}: expected [{}], got [{}]",
        hex_bytes(.expected),
        hex_bytes(.actual)
    )]
    UnexpectedAcknowledgement {
        /// Step of the update sequence that failed.
        step: FlashStep,
        /// Bytes the bootloader should have sent.
        expected: Vec<u8>,
        /// Bytes the bootloader did send.
        actual: Vec<u8>,
    },

    /// Bootloader session was driven again after it had failed.
    #[error("Bootloader session already failed at {step}")]
    SessionFailed {
        /// Step at which the session failed.
        step: FlashStep,
    },

    /// Firmware image text could not be decoded.
    #[error("Malformed image at line {line}: {reason}")]
    MalformedImage {
        /// 1-based line number in the image file.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },
}

/// Step of the bootloader update sequence, used to locate a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashStep {
    /// Entering bootloader mode.
    BootloaderEntry,
    /// Starting the image transfer.
    TransferStart,
    /// Writing the chunk with the given 0-based index.
    Chunk(usize),
    /// Finalizing the update.
    Finalize,
}

impl fmt::Display for FlashStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BootloaderEntry => write!(f, "bootloader entry"),
            Self::TransferStart => write!(f, "transfer start"),
            Self::Chunk(index) => write!(f, "chunk {index}"),
            Self::Finalize => write!(f, "finalize"),
        }
    }
}

/// Format bytes as space separated uppercase hex.
pub(crate) fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_bytes() {
        assert_eq!(hex_bytes(&[]), "");
        assert_eq!(hex_bytes(&[0x0A]), "0A");
        assert_eq!(hex_bytes(&[0xFF, 0x00, 0x02]), "FF 00 02");
    }

    #[test]
    fn test_unexpected_ack_message_names_step_and_bytes() {
        let err = Error::UnexpectedAcknowledgement {
            step: FlashStep::Chunk(3),
            expected: vec![0x20],
            actual: vec![0x45],
        };
        assert_eq!(
            err.to_string(),
            "Unexpected acknowledgement during chunk 3: expected [20], got [45]"
        );
    }

    #[test]
    fn test_session_failed_message() {
        let err = Error::SessionFailed {
            step: FlashStep::Finalize,
        };
        assert_eq!(err.to_string(), "Bootloader session already failed at finalize");
    }

    #[test]
    fn test_checksum_mismatch_message() {
        let err = Error::ChecksumMismatch {
            expected: 0x81,
            actual: 0x7F,
        };
        assert_eq!(err.to_string(), "Checksum mismatch: expected 0x81, got 0x7f");
    }
}
