//! Port abstraction for serial communication with the module.
//!
//! Both protocols spoken to the SM130 run over the same byte stream:
//!
//! ```text
//! +-------------------+     +----------------------+
//! |  Command Exchange |     | Bootloader Session   |
//! |  (framed, 0xFF..) |     | (magic + ack bytes)  |
//! +---------+---------+     +-----------+----------+
//!           |   &mut P, one at a time   |
//!           +-------------+-------------+
//!                         v
//!                +--------+---------+
//!                |    Port trait    |
//!                +--------+---------+
//!                         v
//!                +--------+---------+
//!                | Native SerialPort|
//!                |   (serialport)   |
//!                +------------------+
//! ```
//!
//! The protocol handlers only need `Read + Write`, so tests drive them with
//! in-memory streams.

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "native")]
pub use native::NativePort;

use std::io::{self, Read, Write};
use std::time::Duration;

use log::trace;

use crate::error::Result;

/// Default baud rate of the SM130 serial interface.
pub const DEFAULT_BAUD: u32 = 19200;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Poll interval of a single read. Timed-out reads are retried, so this
    /// does not bound how long an exchange may block.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the read poll interval.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Byte stream connected to an SM130 module.
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Get the current baud rate.
    fn baud_rate(&self) -> u32;

    /// Discard any bytes received but not yet read.
    fn clear_input(&mut self) -> Result<()>;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;
}

/// Read exactly `buf.len()` bytes, blocking until they arrive.
///
/// Timed-out and interrupted reads are retried. End of stream before the
/// buffer is full is an [`io::ErrorKind::UnexpectedEof`] error.
pub fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream closed after {filled} of {} bytes", buf.len()),
                ));
            },
            Ok(n) => filled += n,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {},
            Err(e) => return Err(e),
        }
    }
    trace!("Read {} bytes: {:02X?}", buf.len(), buf);
    Ok(())
}

/// Read exactly `len` bytes into a new buffer.
pub fn read_vec<R: Read + ?Sized>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    read_fully(reader, &mut buf)?;
    Ok(buf)
}

/// Write all bytes and flush, blocking until complete.
pub fn write_fully<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    trace!("Writing {} bytes: {:02X?}", data.len(), data);
    writer.write_all(data)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Reader that hands out one scripted result per call.
    struct ScriptedReader {
        script: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.script.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                },
            }
        }
    }

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyUSB0", 115200).with_timeout(Duration::from_secs(5));

        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_read_fully_joins_partial_reads_and_retries_timeouts() {
        let mut reader = ScriptedReader {
            script: VecDeque::from(vec![
                Ok(vec![0xFF, 0x00]),
                Err(io::Error::new(io::ErrorKind::TimedOut, "poll")),
                Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
                Ok(vec![0x02]),
                Ok(vec![0x95, 0x00, 0xFF]),
            ]),
        };

        let data = read_vec(&mut reader, 6).unwrap();
        assert_eq!(data, [0xFF, 0x00, 0x02, 0x95, 0x00, 0xFF]);
    }

    #[test]
    fn test_read_fully_reports_early_eof() {
        let mut reader = ScriptedReader {
            script: VecDeque::from(vec![Ok(vec![0x20])]),
        };

        let err = read_vec(&mut reader, 2).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_fully_propagates_other_errors() {
        let mut reader = ScriptedReader {
            script: VecDeque::from(vec![Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "unplugged",
            ))]),
        };

        let err = read_vec(&mut reader, 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_read_zero_bytes_does_not_touch_stream() {
        let mut reader = ScriptedReader {
            script: VecDeque::new(),
        };
        assert!(read_vec(&mut reader, 0).unwrap().is_empty());
    }

    #[test]
    fn test_write_fully_writes_everything() {
        let mut out = Vec::new();
        write_fully(&mut out, &[0xFF, 0x00, 0x01, 0x95, 0x96]).unwrap();
        assert_eq!(out, [0xFF, 0x00, 0x01, 0x95, 0x96]);
    }
}
