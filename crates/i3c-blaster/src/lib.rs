//! Host-side driver for the I3C blaster USB adapter.
//!
//! The adapter enumerates as a USB CDC serial port and speaks a line-based text
//! protocol: the host sends `@verb args\r`, the adapter answers with
//! `STATUS(n)[,value,...]`. This crate provides:
//! - The command/reply codec ([`codec`])
//! - Device discovery by USB VID/PID and serial number ([`port`])
//! - A connection session with reconnect and boot-banner suppression ([`session`])
//! - One method per I3C bus primitive ([`I3cBlaster`])
//!
//! Operations are blocking and take `&mut self`; one [`I3cBlaster`] must not be
//! driven from several threads without external serialisation.

pub mod blaster;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod fake;
pub mod port;
pub mod registry;
pub mod session;
pub mod status;

pub use blaster::{DdrConfig, DdrWriteRead, DriveStrength, I3cBlaster, Ibi, PinState};
pub use channel::{ChannelError, SerialBackend, SerialChannel};
pub use codec::{Arg, Command, Response};
pub use config::SessionConfig;
pub use error::BlasterError;
pub use port::{DeviceDescriptor, PortDescriptor, USB_PID, USB_VID};
pub use session::Session;

#[cfg(feature = "native")]
pub use channel::NativeBackend;
#[cfg(feature = "native")]
pub use port::list_devices;
