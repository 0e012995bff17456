//! Connection lifecycle for one adapter
//!
//! A [`Session`] binds to the blaster with a given serial number (or the first one
//! found), opens the port lazily on the first command and keeps it open. Failing
//! to find or open the device is not an error here: [`Session::execute`] then
//! returns an empty reply, which the caller's decode turns into a protocol error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::channel::{ChannelError, SerialBackend, SerialChannel};
use crate::config::SessionConfig;
use crate::error::BlasterError;
use crate::port::{self, DeviceDescriptor};
use crate::registry::{self, ChannelSlot};

/// Owner of the connection to one blaster
///
/// Single-owner: every operation takes `&mut self`. Wrap the session (or the
/// [`crate::I3cBlaster`] holding it) in a mutex to share it between threads.
pub struct Session<B: SerialBackend> {
    backend: B,
    serial_number: Option<String>,
    config: SessionConfig,
    /// Open channel; the slot is also reachable through the registry
    channel: Option<ChannelSlot>,
    port_name: Option<String>,
}

fn lock(slot: &ChannelSlot) -> MutexGuard<'_, Option<Box<dyn SerialChannel>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: SerialBackend> Session<B> {
    /// Create a session; nothing is opened until the first command
    ///
    /// # Arguments
    /// * `backend` - Port discovery and channel implementation
    /// * `serial_number` - Blaster to bind to; `None` binds to the first one found
    /// * `config` - Timing parameters
    pub fn new(backend: B, serial_number: Option<String>, config: SessionConfig) -> Self {
        Self {
            backend,
            serial_number,
            config,
            channel: None,
            port_name: None,
        }
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    /// Port of the open connection
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the timing parameters; takes effect on the next connect
    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Find the blaster this session binds to
    pub fn discover(&self) -> Option<DeviceDescriptor> {
        port::discover(&self.backend, self.serial_number.as_deref())
    }

    /// Whether a channel is open
    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(|slot| lock(slot).is_some())
    }

    /// Make sure a channel is open
    ///
    /// Idempotent unless `force_reconnect` is set, which closes the current channel
    /// first. Returns `false` if no blaster is attached or the port could not be
    /// opened before the connect deadline.
    pub fn ensure_connected(&mut self, force_reconnect: bool) -> bool {
        if force_reconnect && self.channel.is_some() {
            log::debug!("Forcing reconnect");
            self.close();
        }

        if self.channel.is_some() {
            if self.is_connected() {
                return true;
            }
            log::debug!("Channel was released by another owner, reconnecting");
            self.close();
        }

        let Some(device) = self.discover() else {
            log::debug!(
                "No blaster found (serial number: {})",
                self.serial_number.as_deref().unwrap_or("any")
            );
            return false;
        };
        log::debug!("Found blaster on {}", device.port_name);

        registry::release(&device.port_name);

        let Some(mut channel) = self.open_with_retry(&device.port_name) else {
            log::warn!(
                "Could not open {} within {:?}",
                device.port_name,
                self.config.connect_timeout
            );
            return false;
        };

        self.suppress_banner(channel.as_mut());

        let slot: ChannelSlot = Arc::new(Mutex::new(Some(channel)));
        registry::register(&device.port_name, &slot);
        self.channel = Some(slot);
        self.port_name = Some(device.port_name);
        true
    }

    fn open_with_retry(&self, port_name: &str) -> Option<Box<dyn SerialChannel>> {
        let start = Instant::now();
        loop {
            match self
                .backend
                .open(port_name, self.config.baud_rate, self.config.read_timeout)
            {
                Ok(channel) => {
                    log::debug!("Opened {port_name} @ {} baud", self.config.baud_rate);
                    return Some(channel);
                }
                Err(e) => log::trace!("Open of {port_name} failed: {e}"),
            }

            if start.elapsed() >= self.config.connect_timeout {
                return None;
            }
            std::thread::sleep(self.config.open_retry_interval);
        }
    }

    /// Drain the boot banner the adapter prints when the port is opened
    ///
    /// Waits up to `banner_timeout` for the first bytes, then lets the rest arrive
    /// for `banner_settle` and discards everything. Read failures are ignored.
    fn suppress_banner(&self, channel: &mut dyn SerialChannel) {
        let start = Instant::now();
        loop {
            let drained = channel.read_all().unwrap_or_default();
            if !drained.is_empty() {
                std::thread::sleep(self.config.banner_settle);
                let rest = channel.read_all().unwrap_or_default();
                log::debug!("Discarded {} banner bytes", drained.len() + rest.len());
                return;
            }

            if start.elapsed() >= self.config.banner_timeout {
                log::debug!("No banner received");
                return;
            }
            std::thread::sleep(self.config.banner_poll_interval);
        }
    }

    /// Send one command line and read one reply line
    ///
    /// `line` must already be encoded (prefix and terminator included). Returns an
    /// empty string if no connection could be established or the reply timed out.
    /// A channel I/O failure drops the connection so the next call reconnects.
    pub fn execute(&mut self, line: &str) -> Result<String, BlasterError> {
        if !self.ensure_connected(false) {
            return Ok(String::new());
        }
        let Some(slot) = self.channel.clone() else {
            return Ok(String::new());
        };

        let result = {
            let mut guard = lock(&slot);
            match guard.as_mut() {
                Some(channel) => transact(channel.as_mut(), line),
                None => return Ok(String::new()),
            }
        };

        match result {
            Ok(bytes) => {
                let reply = String::from_utf8_lossy(&bytes).into_owned();
                log::trace!("<- {}", reply.trim_end());
                Ok(reply)
            }
            Err(e) => {
                log::warn!(
                    "Channel failure on {}: {e}",
                    self.port_name.as_deref().unwrap_or("?")
                );
                self.close();
                Err(e.into())
            }
        }
    }

    /// Close the channel, if any
    pub fn close(&mut self) {
        let port_name = self.port_name.take();
        let Some(slot) = self.channel.take() else {
            return;
        };

        if let Some(port_name) = &port_name {
            registry::unregister(port_name, &slot);
        }
        if lock(&slot).take().is_some() {
            log::debug!("Closed {}", port_name.as_deref().unwrap_or("?"));
        }
    }
}

fn transact(channel: &mut dyn SerialChannel, line: &str) -> Result<Vec<u8>, ChannelError> {
    match channel.read_all() {
        Ok(stale) if !stale.is_empty() => {
            log::debug!("Discarded {} stale bytes", stale.len());
        }
        Ok(_) => {}
        Err(e) => log::debug!("Flush before command failed: {e}"),
    }

    log::trace!("-> {}", line.trim_end());
    channel.write(line.as_bytes())?;
    channel.read_line()
}

impl<B: SerialBackend> Drop for Session<B> {
    fn drop(&mut self) {
        self.close();
    }
}
