//! Fake serial backend for testing and development
//!
//! An in-memory [`SerialBackend`] that behaves like a blaster without hardware.
//! Can be configured with:
//! - the ports it reports
//! - a queue of reply lines, returned one per `read_line()`
//! - a boot banner presented on every open, possibly late and in pieces
//! - a number of failing open attempts
//!
//! Clones share state, so a test keeps one handle for scripting and inspection
//! while the session owns another.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::channel::{ChannelError, SerialBackend, SerialChannel};
use crate::port::{PortDescriptor, USB_PID, USB_VID};

/// Scripted backend; see the module docs
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    ports: Vec<PortDescriptor>,
    /// Reply lines, terminator included
    replies: VecDeque<Vec<u8>>,
    /// Banner pieces, one released per `read_all()` once the delay has passed
    banner: Vec<Vec<u8>>,
    /// `read_all()` calls that see nothing before the banner starts
    banner_delay: usize,
    /// Banner pieces of the open channel not released yet
    incoming: VecDeque<Vec<u8>>,
    quiet_reads: usize,
    /// Bytes waiting for `read_all()` on the open channel
    pending: Vec<u8>,
    read_alls: usize,
    written: Vec<String>,
    failing_opens: usize,
    io_failure: bool,
    opens: usize,
    closes: usize,
    last_baud_rate: Option<u32>,
}

impl FakeBackend {
    /// Create a backend that reports no ports
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with one blaster attached
    pub fn with_device(port_name: &str, serial_number: &str) -> Self {
        let backend = Self::new();
        backend.add_device(port_name, Some(serial_number));
        backend
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a blaster
    pub fn add_device(&self, port_name: &str, serial_number: Option<&str>) {
        let mut usb_info = format!("USB VID:PID={USB_VID:04X}:{USB_PID:04X}");
        if let Some(serial) = serial_number {
            usb_info.push_str(&format!(" SER={serial}"));
        }
        self.add_port(PortDescriptor {
            port_name: port_name.to_string(),
            usb_info,
            serial_number: serial_number.map(str::to_string),
        });
    }

    /// Report an arbitrary port
    pub fn add_port(&self, port: PortDescriptor) {
        self.state().ports.push(port);
    }

    /// Detach every port
    pub fn clear_ports(&self) {
        self.state().ports.clear();
    }

    /// Queue a reply line (`\r\n` is appended)
    pub fn push_reply(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.extend_from_slice(b"\r\n");
        self.state().replies.push_back(bytes);
    }

    /// Make bytes available to the next `read_all()` of the open channel
    pub fn push_noise(&self, bytes: &[u8]) {
        self.state().pending.extend_from_slice(bytes);
    }

    /// Banner presented by every newly opened channel
    pub fn set_banner(&self, banner: &[u8]) {
        self.set_banner_pieces(&[banner], 0);
    }

    /// Banner that starts after `delay` empty `read_all()` calls and then
    /// arrives one piece per call
    pub fn set_banner_pieces(&self, pieces: &[&[u8]], delay: usize) {
        let mut state = self.state();
        state.banner = pieces.iter().map(|piece| piece.to_vec()).collect();
        state.banner_delay = delay;
    }

    /// Fail the next `count` open attempts (`usize::MAX` fails forever)
    pub fn fail_opens(&self, count: usize) {
        self.state().failing_opens = count;
    }

    /// Make reads and writes on open channels fail
    pub fn set_io_failure(&self, fail: bool) {
        self.state().io_failure = fail;
    }

    /// Every line written so far
    pub fn written(&self) -> Vec<String> {
        self.state().written.clone()
    }

    /// Most recent line written
    pub fn last_written(&self) -> Option<String> {
        self.state().written.last().cloned()
    }

    /// Replies not consumed yet
    pub fn pending_replies(&self) -> usize {
        self.state().replies.len()
    }

    /// Bytes not drained yet, including banner pieces still to arrive
    pub fn pending_noise(&self) -> usize {
        let state = self.state();
        state.pending.len() + state.incoming.iter().map(Vec::len).sum::<usize>()
    }

    /// `read_all()` calls on any channel so far
    pub fn read_all_count(&self) -> usize {
        self.state().read_alls
    }

    /// Successful opens so far
    pub fn open_count(&self) -> usize {
        self.state().opens
    }

    /// Channels closed (dropped) so far
    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    /// Baud rate of the most recent successful open
    pub fn last_baud_rate(&self) -> Option<u32> {
        self.state().last_baud_rate
    }
}

impl SerialBackend for FakeBackend {
    fn available_ports(&self) -> Result<Vec<PortDescriptor>, ChannelError> {
        Ok(self.state().ports.clone())
    }

    fn open(
        &self,
        port_name: &str,
        baud_rate: u32,
        _read_timeout: Duration,
    ) -> Result<Box<dyn SerialChannel>, ChannelError> {
        let mut state = self.state();

        if !state.ports.iter().any(|p| p.port_name == port_name) {
            return Err(ChannelError::NotFound(port_name.to_string()));
        }
        if state.failing_opens > 0 {
            if state.failing_opens != usize::MAX {
                state.failing_opens -= 1;
            }
            return Err(ChannelError::Io(format!("{port_name} is busy")));
        }

        state.opens += 1;
        state.last_baud_rate = Some(baud_rate);
        let incoming = state.banner.iter().cloned().collect();
        let quiet_reads = state.banner_delay;
        state.incoming = incoming;
        state.quiet_reads = quiet_reads;
        state.pending.clear();

        Ok(Box::new(FakeChannel {
            state: self.state.clone(),
        }))
    }
}

struct FakeChannel {
    state: Arc<Mutex<FakeState>>,
}

impl FakeChannel {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SerialChannel for FakeChannel {
    fn write(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        let mut state = self.state();
        if state.io_failure {
            return Err(ChannelError::Io("write failed".to_string()));
        }
        state.written.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ChannelError> {
        let mut state = self.state();
        if state.io_failure {
            return Err(ChannelError::Io("read failed".to_string()));
        }
        // An empty queue behaves like a read timeout
        Ok(state.replies.pop_front().unwrap_or_default())
    }

    fn read_all(&mut self) -> Result<Vec<u8>, ChannelError> {
        let mut state = self.state();
        if state.io_failure {
            return Err(ChannelError::Io("read failed".to_string()));
        }
        state.read_alls += 1;
        if state.quiet_reads > 0 {
            state.quiet_reads -= 1;
        } else if let Some(piece) = state.incoming.pop_front() {
            state.pending.extend_from_slice(&piece);
        }
        Ok(std::mem::take(&mut state.pending))
    }
}

impl Drop for FakeChannel {
    fn drop(&mut self) {
        self.state().closes += 1;
    }
}
