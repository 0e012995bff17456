//! Device discovery
//!
//! Blasters are recognised by the USB VID/PID embedded in the free-text USB
//! descriptor string the OS reports for each serial port
//! (e.g. `USB VID:PID=2E8A:000A SER=E6614C311B4B7A2F`).

use crate::channel::{ChannelError, SerialBackend};

/// USB vendor ID of the blaster
pub const USB_VID: u16 = 0x2E8A;

/// USB product ID of the blaster
pub const USB_PID: u16 = 0x000A;

/// A serial port as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Port path or name (`/dev/ttyACM0`, `COM5`)
    pub port_name: String,
    /// Free-text USB descriptor (`USB VID:PID=XXXX:XXXX ...`), `n/a` for non-USB ports
    pub usb_info: String,
    pub serial_number: Option<String>,
}

impl PortDescriptor {
    /// Whether this port belongs to a blaster
    pub fn is_blaster(&self) -> bool {
        let needle = format!("VID:PID={USB_VID:04X}:{USB_PID:04X}");
        self.usb_info.to_ascii_uppercase().contains(&needle)
    }
}

/// A port matched as a blaster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub port_name: String,
    pub serial_number: Option<String>,
    pub vid: u16,
    pub pid: u16,
}

impl From<PortDescriptor> for DeviceDescriptor {
    fn from(port: PortDescriptor) -> Self {
        Self {
            port_name: port.port_name,
            serial_number: port.serial_number,
            vid: USB_VID,
            pid: USB_PID,
        }
    }
}

/// All attached blasters, in enumeration order
pub fn devices<B: SerialBackend + ?Sized>(
    backend: &B,
) -> Result<Vec<DeviceDescriptor>, ChannelError> {
    Ok(backend
        .available_ports()?
        .into_iter()
        .filter(PortDescriptor::is_blaster)
        .map(DeviceDescriptor::from)
        .collect())
}

/// Find a blaster, either the first one or the one with `serial_number`
///
/// Enumeration failures count as "not found".
pub fn discover<B: SerialBackend + ?Sized>(
    backend: &B,
    serial_number: Option<&str>,
) -> Option<DeviceDescriptor> {
    let devices = match devices(backend) {
        Ok(devices) => devices,
        Err(e) => {
            log::debug!("Port enumeration failed: {e}");
            return None;
        }
    };

    devices.into_iter().find(|device| match serial_number {
        None => true,
        Some(wanted) => device.serial_number.as_deref() == Some(wanted),
    })
}

/// Serial numbers of all attached blasters
///
/// Not deduplicated; a blaster without a serial number is reported as an empty string.
pub fn serial_numbers<B: SerialBackend + ?Sized>(backend: &B) -> Result<Vec<String>, ChannelError> {
    Ok(devices(backend)?
        .into_iter()
        .map(|device| device.serial_number.unwrap_or_default())
        .collect())
}

/// Serial numbers of all blasters attached to this host
#[cfg(feature = "native")]
pub fn list_devices() -> Result<Vec<String>, ChannelError> {
    serial_numbers(&crate::channel::NativeBackend)
}
