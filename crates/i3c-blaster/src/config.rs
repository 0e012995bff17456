//! Session timing configuration

use std::time::Duration;

/// Line rate the firmware expects
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Connection and timing parameters of a [`crate::Session`]
///
/// The defaults match the adapter firmware; tests shorten the waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub baud_rate: u32,
    /// Upper bound for a single reply line
    pub read_timeout: Duration,
    /// Give up opening the port after this long
    pub connect_timeout: Duration,
    /// Pause between failed open attempts
    pub open_retry_interval: Duration,
    /// Wait after the first banner bytes before draining the rest
    pub banner_settle: Duration,
    /// Stop waiting for a boot banner after this long
    pub banner_timeout: Duration,
    /// Pause between polls while waiting for a boot banner
    pub banner_poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(2),
            open_retry_interval: Duration::from_millis(50),
            banner_settle: Duration::from_millis(500),
            banner_timeout: Duration::from_secs(2),
            banner_poll_interval: Duration::from_millis(10),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_open_retry_interval(mut self, interval: Duration) -> Self {
        self.open_retry_interval = interval;
        self
    }

    pub fn with_banner_settle(mut self, settle: Duration) -> Self {
        self.banner_settle = settle;
        self
    }

    pub fn with_banner_timeout(mut self, timeout: Duration) -> Self {
        self.banner_timeout = timeout;
        self
    }

    pub fn with_banner_poll_interval(mut self, interval: Duration) -> Self {
        self.banner_poll_interval = interval;
        self
    }
}
