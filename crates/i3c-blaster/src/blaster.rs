//! I3C bus operations
//!
//! [`I3cBlaster`] exposes one method per firmware command. Each method encodes the
//! command, runs it through the [`Session`], decodes the reply and maps the status:
//! `OK(0)` yields the operation's result, an anticipated alternate (NAK during
//! ENTDAA, no pending IBI) yields `None`, anything else is a
//! [`BlasterError::Protocol`].
//!
//! Operations without a result ignore any values that follow `OK(0)`.

use crate::channel::{ChannelError, SerialBackend};
use crate::codec::{self, Command, Response};
use crate::config::SessionConfig;
use crate::error::BlasterError;
use crate::port;
use crate::session::Session;
use crate::status;

/// Number of general purpose pins the adapter exposes
pub const GPIO_COUNT: u8 = 16;

/// Output state of a GPIO pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    /// Driven low
    Low,
    /// Driven high
    High,
    /// Tri-state (input)
    HiZ,
}

impl PinState {
    /// Character the firmware expects
    pub fn as_char(self) -> char {
        match self {
            PinState::Low => '0',
            PinState::High => '1',
            PinState::HiZ => 'Z',
        }
    }
}

impl From<bool> for PinState {
    fn from(high: bool) -> Self {
        if high { PinState::High } else { PinState::Low }
    }
}

impl From<Option<bool>> for PinState {
    fn from(state: Option<bool>) -> Self {
        state.map_or(PinState::HiZ, PinState::from)
    }
}

/// SDA/SCL pad drive strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveStrength {
    Ma2,
    Ma4,
    Ma8,
    /// Firmware default
    Ma12,
}

impl DriveStrength {
    pub fn milliamps(self) -> u8 {
        match self {
            DriveStrength::Ma2 => 2,
            DriveStrength::Ma4 => 4,
            DriveStrength::Ma8 => 8,
            DriveStrength::Ma12 => 12,
        }
    }
}

impl TryFrom<u8> for DriveStrength {
    type Error = BlasterError;

    fn try_from(milliamps: u8) -> Result<Self, Self::Error> {
        match milliamps {
            2 => Ok(DriveStrength::Ma2),
            4 => Ok(DriveStrength::Ma4),
            8 => Ok(DriveStrength::Ma8),
            12 => Ok(DriveStrength::Ma12),
            other => Err(BlasterError::InvalidArgument(format!(
                "drive strength must be 2, 4, 8 or 12 mA, got {other}"
            ))),
        }
    }
}

/// HDR-DDR target capabilities (see the ENDXFER CCC)
///
/// All three flags false suits targets implementing I3C v1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdrConfig {
    /// No CRC word follows an early termination request
    pub crc_word_indicator: bool,
    /// Target may request early write termination
    pub enable_early_write_term: bool,
    /// Target ACK/NACKs write commands
    pub write_ack_enable: bool,
}

impl Default for DdrConfig {
    fn default() -> Self {
        Self {
            crc_word_indicator: true,
            enable_early_write_term: false,
            write_ack_enable: false,
        }
    }
}

/// In-band interrupt or hot-join request fetched by [`I3cBlaster::i3c_poll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ibi {
    /// Address that raised the request
    pub address: u8,
    /// Mandatory data byte and payload
    pub payload: Vec<u8>,
}

/// Result of [`I3cBlaster::i3c_ddr_writeread`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdrWriteRead {
    /// Words accepted during the write phase
    pub written: u32,
    /// Words returned by the read phase
    pub data: Vec<u16>,
}

/// Driver for one I3C blaster
///
/// # Examples
///
/// On hardware, `I3cBlaster::new(None)` binds to the first attached blaster. Here
/// the adapter is scripted:
///
/// ```
/// use std::time::Duration;
///
/// use i3c_blaster::fake::FakeBackend;
/// use i3c_blaster::{I3cBlaster, SessionConfig};
///
/// let backend = FakeBackend::with_device("/dev/ttyACM0", "E6614C311B4B7A2F");
/// backend.push_reply("OK(0)");
/// backend.push_reply("OK(0),0x04,0x6a,0x00,0x00,0x00,0x00,0x27,0xa0");
/// backend.push_reply("OK(0),0x12,0x34");
///
/// let config = SessionConfig::default().with_banner_timeout(Duration::ZERO);
/// let mut i3c = I3cBlaster::with_backend(backend, None).with_config(config);
/// i3c.i3c_rstdaa()?;
/// i3c.i3c_entdaa(0x30)?;
/// let data = i3c.i3c_sdr_writeread(0x30, &[0x00], 10)?;
/// assert_eq!(data, vec![0x12, 0x34]);
/// # Ok::<(), i3c_blaster::BlasterError>(())
/// ```
pub struct I3cBlaster<B: SerialBackend> {
    session: Session<B>,
}

#[cfg(feature = "native")]
impl I3cBlaster<crate::channel::NativeBackend> {
    /// Driver for the blaster with `serial_number`, or the first one found
    pub fn new(serial_number: Option<&str>) -> Self {
        Self::with_backend(crate::channel::NativeBackend, serial_number)
    }
}

impl<B: SerialBackend> I3cBlaster<B> {
    /// Driver on a custom backend
    pub fn with_backend(backend: B, serial_number: Option<&str>) -> Self {
        Self {
            session: Session::new(
                backend,
                serial_number.map(str::to_string),
                SessionConfig::default(),
            ),
        }
    }

    /// Replace the session timing parameters
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.session.set_config(config);
        self
    }

    pub fn session(&self) -> &Session<B> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<B> {
        &mut self.session
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.session.serial_number()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.session.port_name()
    }

    /// Open the connection now instead of on the first command
    pub fn connect(&mut self) -> bool {
        self.session.ensure_connected(false)
    }

    /// Close and reopen the connection
    pub fn reconnect(&mut self) -> bool {
        self.session.ensure_connected(true)
    }

    pub fn close(&mut self) {
        self.session.close();
    }

    /// Serial numbers of all blasters visible through this driver's backend
    pub fn list_devices(&self) -> Result<Vec<String>, ChannelError> {
        port::serial_numbers(self.session.backend())
    }

    fn transfer(&mut self, command: Command) -> Result<Response, BlasterError> {
        let reply = self.session.execute(&command.encode())?;
        let response = codec::decode(&reply)?;
        if !response.is_ok() {
            log::debug!("{} returned '{}'", command.verb(), response.status);
        }
        Ok(response)
    }

    fn run(&mut self, command: Command) -> Result<Vec<i64>, BlasterError> {
        self.transfer(command)?.into_values()
    }

    /// Set a GPIO pin (0..15) high, low or tri-state
    pub fn gpio_write(&mut self, pin: u8, state: impl Into<PinState>) -> Result<(), BlasterError> {
        if pin >= GPIO_COUNT {
            return Err(BlasterError::InvalidArgument(format!(
                "GPIO pin must be in range 0..{}, got {pin}",
                GPIO_COUNT - 1
            )));
        }
        let state: PinState = state.into();
        self.run(Command::new("gpio_write").arg(pin).arg(state.as_char()))?;
        Ok(())
    }

    /// Read one GPIO pin (0 or 1), or the whole port as a bit mask when `pin` is `None`
    pub fn gpio_read(&mut self, pin: Option<u8>) -> Result<u32, BlasterError> {
        let mut command = Command::new("gpio_read");
        if let Some(pin) = pin {
            command = command.arg(pin);
        }
        let values = self.run(command)?;
        let value = first(&values, "GPIO state")?;
        u32::try_from(value)
            .map_err(|_| BlasterError::Format(format!("GPIO state {value} out of range")))
    }

    /// Addresses (7-bit) that ACK on the bus
    pub fn i3c_scan(&mut self) -> Result<Vec<u8>, BlasterError> {
        let values = self.run(Command::new("i3c_scan"))?;
        to_bytes(&values)
    }

    /// Broadcast RSTDAA: unassign every dynamic address
    pub fn i3c_rstdaa(&mut self) -> Result<(), BlasterError> {
        self.run(Command::new("i3c_rstdaa"))?;
        Ok(())
    }

    /// ENTDAA: assign `address` to the next target taking part
    ///
    /// Returns the 8 bytes read during the cycle (PID, BCR, DCR), or `None` if no
    /// target answered (0x7E NAKed).
    pub fn i3c_entdaa(&mut self, address: u8) -> Result<Option<Vec<u8>>, BlasterError> {
        let response = self.transfer(Command::new("i3c_entdaa").arg(address))?;
        match response.into_values_or(status::NAKED)? {
            Some(values) => to_bytes(&values).map(Some),
            None => Ok(None),
        }
    }

    /// Put a target reset pattern on the bus
    pub fn i3c_targetreset(&mut self) -> Result<(), BlasterError> {
        self.run(Command::new("i3c_targetreset"))?;
        Ok(())
    }

    /// Set the SCL frequency in kHz (e.g. 12500 for 12.5 MHz)
    pub fn i3c_clock(&mut self, rate_khz: u32) -> Result<(), BlasterError> {
        self.run(Command::new("i3c_clock").arg(rate_khz))?;
        Ok(())
    }

    /// Private SDR write
    pub fn i3c_sdr_write(&mut self, address: u8, data: &[u8]) -> Result<(), BlasterError> {
        self.run(Command::new("i3c_sdr_write").arg(address).arg(data))?;
        Ok(())
    }

    /// Private SDR read of up to `count` bytes
    ///
    /// The result is shorter than requested when the target ends the read early.
    pub fn i3c_sdr_read(&mut self, address: u8, count: u32) -> Result<Vec<u8>, BlasterError> {
        let values = self.run(Command::new("i3c_sdr_read").arg(address).arg(count))?;
        to_bytes(&values)
    }

    /// Private SDR write, repeated start, read of up to `count` bytes
    pub fn i3c_sdr_writeread(
        &mut self,
        address: u8,
        data: &[u8],
        count: u32,
    ) -> Result<Vec<u8>, BlasterError> {
        let command = Command::new("i3c_sdr_writeread")
            .arg(address)
            .arg(data)
            .arg(count);
        let values = self.run(command)?;
        to_bytes(&values)
    }

    /// Broadcast CCC write; `data` starts with the CCC code
    pub fn i3c_sdr_ccc_bc_write(&mut self, data: &[u8]) -> Result<(), BlasterError> {
        self.run(Command::new("i3c_sdr_ccc_bc_write").arg(data))?;
        Ok(())
    }

    /// Direct CCC write
    ///
    /// `broadcast` is sent in the broadcast phase (CCC code first), `direct` after
    /// addressing `address`.
    pub fn i3c_sdr_ccc_direct_write(
        &mut self,
        address: u8,
        broadcast: &[u8],
        direct: &[u8],
    ) -> Result<(), BlasterError> {
        let command = Command::new("i3c_sdr_ccc_direct_write")
            .arg(address)
            .arg(broadcast)
            .arg(direct);
        self.run(command)?;
        Ok(())
    }

    /// Direct CCC read of up to `count` bytes from `address`
    pub fn i3c_sdr_ccc_direct_read(
        &mut self,
        address: u8,
        broadcast: &[u8],
        count: u32,
    ) -> Result<Vec<u8>, BlasterError> {
        let command = Command::new("i3c_sdr_ccc_direct_read")
            .arg(address)
            .arg(broadcast)
            .arg(count);
        let values = self.run(command)?;
        to_bytes(&values)
    }

    /// Fetch a pending in-band interrupt or hot-join request
    ///
    /// Call after a transfer failed with [`BlasterError::is_ibi_pending`].
    pub fn i3c_poll(&mut self) -> Result<Option<Ibi>, BlasterError> {
        let response = self.transfer(Command::new("i3c_poll"))?;
        let Some(values) = response.into_values_or(status::NO_IBI)? else {
            return Ok(None);
        };
        let bytes = to_bytes(&values)?;
        let (&address, payload) = bytes
            .split_first()
            .ok_or_else(|| BlasterError::Format("IBI without target address".to_string()))?;
        Ok(Some(Ibi {
            address,
            payload: payload.to_vec(),
        }))
    }

    /// Set the controller's SDA/SCL drive strength
    pub fn i3c_drivestrength(&mut self, strength: DriveStrength) -> Result<(), BlasterError> {
        self.run(Command::new("i3c_drivestrength").arg(strength.milliamps()))?;
        Ok(())
    }

    /// Configure HDR-DDR target capabilities for subsequent DDR transfers
    pub fn i3c_ddr_config(&mut self, config: DdrConfig) -> Result<(), BlasterError> {
        let command = Command::new("i3c_ddr_config")
            .arg(config.crc_word_indicator)
            .arg(config.enable_early_write_term)
            .arg(config.write_ack_enable);
        self.run(command)?;
        Ok(())
    }

    /// HDR-DDR write of 16-bit words with the 7-bit `command` code
    pub fn i3c_ddr_write(
        &mut self,
        address: u8,
        command: u8,
        words: &[u16],
    ) -> Result<(), BlasterError> {
        let command = Command::new("i3c_ddr_write")
            .arg(address)
            .arg(command)
            .arg(words);
        self.run(command)?;
        Ok(())
    }

    /// HDR-DDR read of up to `count` words with the 7-bit `command` code
    pub fn i3c_ddr_read(
        &mut self,
        address: u8,
        command: u8,
        count: u32,
    ) -> Result<Vec<u16>, BlasterError> {
        let command = Command::new("i3c_ddr_read")
            .arg(address)
            .arg(command)
            .arg(count);
        let values = self.run(command)?;
        to_words(&values)
    }

    /// HDR-DDR write followed by an HDR restart and read
    ///
    /// The first reply value is the number of words written, the rest is read
    /// data. A reply without values yields `written == 0` and no data.
    pub fn i3c_ddr_writeread(
        &mut self,
        address: u8,
        write_command: u8,
        read_command: u8,
        words: &[u16],
        count: u32,
    ) -> Result<DdrWriteRead, BlasterError> {
        let command = Command::new("i3c_ddr_writeread")
            .arg(address)
            .arg(write_command)
            .arg(read_command)
            .arg(words)
            .arg(count);
        let values = self.run(command)?;

        let Some((&written, data)) = values.split_first() else {
            return Ok(DdrWriteRead::default());
        };
        let written = u32::try_from(written)
            .map_err(|_| BlasterError::Format(format!("word count {written} out of range")))?;
        Ok(DdrWriteRead {
            written,
            data: to_words(data)?,
        })
    }
}

fn first(values: &[i64], what: &str) -> Result<i64, BlasterError> {
    values
        .first()
        .copied()
        .ok_or_else(|| BlasterError::Format(format!("reply is missing the {what}")))
}

fn to_bytes(values: &[i64]) -> Result<Vec<u8>, BlasterError> {
    values
        .iter()
        .map(|&v| {
            u8::try_from(v).map_err(|_| BlasterError::Format(format!("value {v} is not a byte")))
        })
        .collect()
}

fn to_words(values: &[i64]) -> Result<Vec<u16>, BlasterError> {
    values
        .iter()
        .map(|&v| {
            u16::try_from(v)
                .map_err(|_| BlasterError::Format(format!("value {v} is not a 16-bit word")))
        })
        .collect()
}
