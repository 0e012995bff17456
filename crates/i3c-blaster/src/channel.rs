//! Serial channel abstraction
//!
//! [`SerialBackend`] lists ports and opens channels; [`SerialChannel`] is one open
//! byte stream. Dropping a channel closes it. The session only talks to these
//! traits, so the same core logic runs on every OS (and against
//! [`crate::fake::FakeBackend`] in tests).

use core::fmt;
use std::time::Duration;

use crate::port::PortDescriptor;

/// Error reported by a serial backend or channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Port does not exist (anymore)
    NotFound(String),
    /// Read/write/open failure
    Io(String),
    /// Listing the available ports failed
    Enumeration(String),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::NotFound(port) => write!(f, "Port not found: {port}"),
            ChannelError::Io(msg) => write!(f, "I/O error: {msg}"),
            ChannelError::Enumeration(msg) => write!(f, "Failed to list serial ports: {msg}"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// One open serial byte stream
pub trait SerialChannel: Send {
    /// Write all bytes
    fn write(&mut self, data: &[u8]) -> Result<(), ChannelError>;

    /// Read up to and including the next `\n`
    ///
    /// Blocks for at most the read timeout given at open time. On timeout returns
    /// whatever arrived so far, which is empty if nothing arrived.
    fn read_line(&mut self) -> Result<Vec<u8>, ChannelError>;

    /// Return every byte currently buffered without blocking (possibly none)
    fn read_all(&mut self) -> Result<Vec<u8>, ChannelError>;
}

/// Port discovery plus channel opening
pub trait SerialBackend {
    /// All serial ports known to the OS, in enumeration order
    fn available_ports(&self) -> Result<Vec<PortDescriptor>, ChannelError>;

    /// Open `port_name` at `baud_rate` with the given blocking read timeout
    fn open(
        &self,
        port_name: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialChannel>, ChannelError>;
}

#[cfg(feature = "native")]
pub use native::NativeBackend;

#[cfg(feature = "native")]
mod native {
    use std::io::{self, Read, Write};
    use std::time::{Duration, Instant};

    use serialport::{SerialPort, SerialPortType};

    use super::{ChannelError, SerialBackend, SerialChannel};
    use crate::port::PortDescriptor;

    /// OS serial ports through the `serialport` crate
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NativeBackend;

    impl SerialBackend for NativeBackend {
        fn available_ports(&self) -> Result<Vec<PortDescriptor>, ChannelError> {
            let ports = serialport::available_ports()
                .map_err(|e| ChannelError::Enumeration(e.to_string()))?;

            Ok(ports
                .into_iter()
                .map(|port| match port.port_type {
                    SerialPortType::UsbPort(info) => {
                        let mut usb_info = format!("USB VID:PID={:04X}:{:04X}", info.vid, info.pid);
                        if let Some(serial) = &info.serial_number {
                            usb_info.push_str(&format!(" SER={serial}"));
                        }
                        PortDescriptor {
                            port_name: port.port_name,
                            usb_info,
                            serial_number: info.serial_number,
                        }
                    }
                    _ => PortDescriptor {
                        port_name: port.port_name,
                        usb_info: "n/a".to_string(),
                        serial_number: None,
                    },
                })
                .collect())
        }

        fn open(
            &self,
            port_name: &str,
            baud_rate: u32,
            read_timeout: Duration,
        ) -> Result<Box<dyn SerialChannel>, ChannelError> {
            let port = serialport::new(port_name, baud_rate)
                .timeout(read_timeout)
                .open()
                .map_err(|e| match e.kind() {
                    serialport::ErrorKind::NoDevice => ChannelError::NotFound(port_name.to_string()),
                    _ => ChannelError::Io(format!("Failed to open {port_name}: {e}")),
                })?;

            Ok(Box::new(NativeChannel {
                port,
                read_timeout,
                read_buffer: Vec::new(),
            }))
        }
    }

    struct NativeChannel {
        port: Box<dyn SerialPort>,
        read_timeout: Duration,
        /// Bytes read past the last returned line
        read_buffer: Vec<u8>,
    }

    fn io_error(e: io::Error) -> ChannelError {
        ChannelError::Io(e.to_string())
    }

    impl SerialChannel for NativeChannel {
        fn write(&mut self, data: &[u8]) -> Result<(), ChannelError> {
            self.port.write_all(data).map_err(io_error)?;
            self.port.flush().map_err(io_error)
        }

        fn read_line(&mut self) -> Result<Vec<u8>, ChannelError> {
            let deadline = Instant::now() + self.read_timeout;
            let mut chunk = [0u8; 256];

            loop {
                if let Some(newline_pos) = self.read_buffer.iter().position(|&b| b == b'\n') {
                    return Ok(self.read_buffer.drain(..=newline_pos).collect());
                }

                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(std::mem::take(&mut self.read_buffer));
                }

                self.port
                    .set_timeout(remaining)
                    .map_err(|e| ChannelError::Io(e.to_string()))?;
                match self.port.read(&mut chunk) {
                    Ok(n) => self.read_buffer.extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(io_error(e)),
                }
            }
        }

        fn read_all(&mut self) -> Result<Vec<u8>, ChannelError> {
            let mut data = std::mem::take(&mut self.read_buffer);

            let available = self
                .port
                .bytes_to_read()
                .map_err(|e| ChannelError::Io(e.to_string()))? as usize;
            if available > 0 {
                let start = data.len();
                data.resize(start + available, 0);
                match self.port.read(&mut data[start..]) {
                    Ok(n) => data.truncate(start + n),
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => data.truncate(start),
                    Err(e) => return Err(io_error(e)),
                }
            }

            Ok(data)
        }
    }
}
