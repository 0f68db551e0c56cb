//! Synchronous command exchange with the SM130 firmware.
//!
//! One request frame goes out, one response frame comes back. The response is
//! read in two parts: a fixed 4-byte head (header, reserved, length,
//! response code) and then `length - 1` payload bytes plus the checksum.

use std::io::{Read, Write};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::port::{read_fully, read_vec, write_fully};
use crate::protocol::frame::{
    self, Command, Frame, HEADER, RESERVED, bad_header, bad_length, bad_reserved, verify_checksum,
};

/// Send one command and return the payload of its response.
///
/// Fails on the first violation found, in this order: header byte, reserved
/// byte, checksum, response code. Nothing is retried.
pub fn send_command<P: Read + Write + ?Sized>(
    port: &mut P,
    code: u8,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let request = frame::build_frame(code, payload);
    debug!("Sending command 0x{code:02X}: {} bytes", request.len());
    write_fully(port, &request)?;

    let mut head = [0u8; 4];
    read_fully(port, &mut head)?;
    let [header, reserved, length, response_to] = head;

    if header != HEADER {
        return Err(bad_header(header));
    }
    if reserved != RESERVED {
        return Err(bad_reserved(reserved));
    }
    if length == 0 {
        return Err(bad_length(length));
    }

    let response = Frame {
        code: response_to,
        payload: read_vec(port, usize::from(length) - 1)?,
    };
    let mut received_checksum = [0u8; 1];
    read_fully(port, &mut received_checksum)?;

    verify_checksum(response.checksum(), received_checksum[0])?;

    if response_to != code {
        return Err(Error::UnexpectedResponseCode {
            expected: code,
            actual: response_to,
        });
    }

    trace!("Response to 0x{code:02X}: {:02X?}", response.payload);
    Ok(response.payload)
}

/// Framed request/response protocol bound to a borrowed port.
///
/// Holding the port mutably keeps a [`BootloaderSession`] from running on the
/// same port at the same time.
///
/// [`BootloaderSession`]: crate::protocol::bootloader::BootloaderSession
pub struct CommandChannel<'a, P: Read + Write + ?Sized> {
    port: &'a mut P,
}

impl<'a, P: Read + Write + ?Sized> CommandChannel<'a, P> {
    /// Bind the command protocol to a port.
    pub fn new(port: &'a mut P) -> Self {
        Self { port }
    }

    /// Send a raw command code with a payload.
    pub fn send(&mut self, code: u8, payload: &[u8]) -> Result<Vec<u8>> {
        send_command(&mut *self.port, code, payload)
    }

    /// Send a known command.
    pub fn command(&mut self, command: Command, payload: &[u8]) -> Result<Vec<u8>> {
        self.send(command.code(), payload)
    }

    /// Read the firmware version string.
    ///
    /// The payload is decoded as lossy UTF-8; trailing NUL bytes are dropped.
    pub fn firmware_version(&mut self) -> Result<String> {
        let payload = self.command(Command::GetFirmwareVersion, &[])?;
        Ok(String::from_utf8_lossy(&payload)
            .trim_end_matches('\0')
            .to_string())
    }
}
