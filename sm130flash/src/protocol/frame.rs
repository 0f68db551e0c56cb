//! SM130 command/response frame codec.
//!
//! ## Frame Format
//!
//! Requests and responses share one layout:
//!
//! ```text
//! +--------+----------+--------+------+---------------+----------+
//! | Header | Reserved | Length | Code |    Payload    | Checksum |
//! +--------+----------+--------+------+---------------+----------+
//! | 1 byte |  1 byte  | 1 byte |  1   | 0..=253 bytes |  1 byte  |
//! +--------+----------+--------+------+---------------+----------+
//! |  0xFF  |   0x00   | 1 + n  | cmd  |    payload    |   sum    |
//! +--------+----------+--------+------+---------------+----------+
//! ```
//!
//! `Length` counts the code byte plus the payload. The checksum is the sum
//! modulo 256 of every byte after the header. The reserved byte is always
//! zero, so it never changes the sum.

use crate::error::{Error, Result};
use log::debug;

/// Frame header marker.
pub const HEADER: u8 = 0xFF;

/// Reserved byte following the header.
pub const RESERVED: u8 = 0x00;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD: usize = 253;

/// Bytes a frame adds around its payload (header, reserved, length, code,
/// checksum).
pub const FRAME_OVERHEAD: usize = 5;

/// Sum of `bytes` modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Serialize a frame carrying `code` and `payload`.
///
/// # Panics
///
/// Panics if `payload` is longer than [`MAX_PAYLOAD`].
pub fn build_frame(code: u8, payload: &[u8]) -> Vec<u8> {
    Frame::new(code, payload).build()
}

/// Known SM130 command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Read the firmware version string (0x81).
    GetFirmwareVersion = 0x81,
}

impl Command {
    /// Wire value of the command.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A decoded command or response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command code, or for a response the code of the command it answers.
    pub code: u8,
    /// Frame payload.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame from a code and payload.
    ///
    /// # Panics
    ///
    /// Panics if `payload` is longer than [`MAX_PAYLOAD`].
    pub fn new(code: u8, payload: &[u8]) -> Self {
        assert!(
            payload.len() <= MAX_PAYLOAD,
            "payload of {} bytes exceeds frame capacity",
            payload.len()
        );
        Self {
            code,
            payload: payload.to_vec(),
        }
    }

    /// Value of the length byte: code plus payload.
    ///
    /// Saturates at `0xFF` for a payload built by hand past what the length
    /// byte can describe.
    pub fn length_byte(&self) -> u8 {
        u8::try_from(self.payload.len() + 1).unwrap_or(u8::MAX)
    }

    /// Checksum over the reserved, length, code and payload bytes.
    pub fn checksum(&self) -> u8 {
        checksum(&[RESERVED, self.length_byte(), self.code])
            .wrapping_add(checksum(&self.payload))
    }

    /// Build the complete frame data.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.payload.len() + FRAME_OVERHEAD);
        buf.push(HEADER);
        buf.push(RESERVED);
        buf.push(self.length_byte());
        buf.push(self.code);
        buf.extend_from_slice(&self.payload);
        buf.push(checksum(&buf[1..]));
        buf
    }

    /// Parse a complete serialized frame.
    ///
    /// Checks run in wire order: header, reserved byte, length, checksum.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (&header, rest) = data.split_first().ok_or_else(truncated)?;
        if header != HEADER {
            return Err(bad_header(header));
        }
        let (&reserved, rest) = rest.split_first().ok_or_else(truncated)?;
        if reserved != RESERVED {
            return Err(bad_reserved(reserved));
        }
        let (&length, rest) = rest.split_first().ok_or_else(truncated)?;
        if length == 0 {
            return Err(bad_length(length));
        }

        // code + payload + checksum
        let body_len = usize::from(length) + 1;
        if rest.len() != body_len {
            debug!(
                "Frame declares {body_len} bytes after the length, {} present",
                rest.len()
            );
            return Err(Error::MalformedFrameHeader {
                field: "length",
                expected: "the number of bytes that follow",
                actual: length,
            });
        }

        // Received frames may carry one byte more than MAX_PAYLOAD
        let frame = Self {
            code: rest[0],
            payload: rest[1..body_len - 1].to_vec(),
        };
        verify_checksum(frame.checksum(), rest[body_len - 1])?;
        Ok(frame)
    }
}

pub(crate) fn bad_header(actual: u8) -> Error {
    Error::MalformedFrameHeader {
        field: "header",
        expected: "0xff",
        actual,
    }
}

pub(crate) fn bad_reserved(actual: u8) -> Error {
    Error::MalformedFrameHeader {
        field: "reserved byte",
        expected: "0x00",
        actual,
    }
}

pub(crate) fn bad_length(actual: u8) -> Error {
    Error::MalformedFrameHeader {
        field: "length",
        expected: "at least 1",
        actual,
    }
}

pub(crate) fn verify_checksum(expected: u8, actual: u8) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch { expected, actual })
    }
}

fn truncated() -> Error {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated frame").into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn test_checksum_wraps_modulo_256() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        let bytes: Vec<u8> = (0..=255).collect();
        let expected = (bytes.iter().map(|&b| u32::from(b)).sum::<u32>() % 256) as u8;
        assert_eq!(checksum(&bytes), expected);
    }

    #[test]
    fn test_checksum_ignores_order() {
        let bytes = [0x12, 0x9A, 0xFE, 0x01, 0x77];
        let mut reversed = bytes;
        reversed.reverse();
        assert_eq!(checksum(&bytes), checksum(&reversed));
    }

    #[test]
    fn test_get_firmware_version_frame() {
        // FF 00 01 81 82
        let data = build_frame(Command::GetFirmwareVersion.code(), &[]);
        assert_eq!(data, [0xFF, 0x00, 0x01, 0x81, 0x82]);
    }

    #[test]
    fn test_frame_with_payload() {
        let data = build_frame(0x82, &[0x01, 0x02]);
        assert_eq!(data, [0xFF, 0x00, 0x03, 0x82, 0x01, 0x02, 0x88]);
    }

    #[test]
    fn test_frame_length_is_payload_plus_overhead() {
        for len in [0usize, 1, 17, MAX_PAYLOAD] {
            let payload = vec![0xA5; len];
            assert_eq!(build_frame(0x10, &payload).len(), len + FRAME_OVERHEAD);
        }
    }

    #[test]
    fn test_checksum_covers_everything_but_header() {
        let data = build_frame(0x90, &[0xDE, 0xAD, 0xBE, 0xEF]);
        let (last, body) = data.split_last().unwrap();
        assert_eq!(*last, checksum(&body[1..]));
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn test_parse_recovers_code_and_payload() {
        for len in 0..=MAX_PAYLOAD {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let code = (len % 256) as u8;
            let data = build_frame(code, &payload);
            assert_eq!(data, build_frame(code, &payload));

            let frame = Frame::parse(&data).unwrap();
            assert_eq!(frame.code, code);
            assert_eq!(frame.payload, payload);
        }
    }

    #[test]
    fn test_parse_rejects_bad_header() {
        let mut data = build_frame(0x81, b"UM");
        data[0] = 0xFE;
        assert!(matches!(
            Frame::parse(&data),
            Err(Error::MalformedFrameHeader {
                field: "header",
                actual: 0xFE,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_reserved() {
        let mut data = build_frame(0x81, b"UM");
        data[1] = 0x01;
        assert!(matches!(
            Frame::parse(&data),
            Err(Error::MalformedFrameHeader {
                field: "reserved byte",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_rejects_zero_length() {
        let data = [0xFF, 0x00, 0x00, 0x00];
        assert!(matches!(
            Frame::parse(&data),
            Err(Error::MalformedFrameHeader { field: "length", .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let mut data = build_frame(0x81, b"UM13");
        let last = data.len() - 1;
        data[last] = data[last].wrapping_add(1);
        assert!(matches!(
            Frame::parse(&data),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_accepts_full_length_response() {
        // Length 0xFF leaves 254 payload bytes
        let payload = vec![0x11; 254];
        let mut data = vec![HEADER, RESERVED, 0xFF, 0x81];
        data.extend_from_slice(&payload);
        data.push(checksum(&data[1..]));

        let frame = Frame::parse(&data).unwrap();
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn test_parse_rejects_body_length_mismatch() {
        let data = build_frame(0x81, b"UM13");
        assert!(matches!(
            Frame::parse(&data[..data.len() - 1]),
            Err(Error::MalformedFrameHeader {
                field: "length",
                actual: 5,
                ..
            })
        ));

        let mut padded = data;
        padded.push(0x00);
        assert!(matches!(
            Frame::parse(&padded),
            Err(Error::MalformedFrameHeader { field: "length", .. })
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_header() {
        assert!(matches!(Frame::parse(&[]), Err(Error::Transport(_))));
        assert!(matches!(
            Frame::parse(&[HEADER, RESERVED]),
            Err(Error::Transport(_))
        ));
    }

    #[test]
    #[should_panic(expected = "exceeds frame capacity")]
    fn test_build_frame_rejects_oversized_payload() {
        let _ = build_frame(0x81, &[0u8; MAX_PAYLOAD + 1]);
    }

    #[test]
    fn test_length_byte_saturates() {
        let frame = Frame {
            code: 0x81,
            payload: vec![0u8; 300],
        };
        assert_eq!(frame.length_byte(), 0xFF);

        let full = Frame {
            code: 0x81,
            payload: vec![0u8; MAX_PAYLOAD + 1],
        };
        assert_eq!(full.length_byte(), 0xFF);
    }
}
