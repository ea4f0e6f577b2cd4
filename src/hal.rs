//! Hardware abstraction traits
//!
//! Everything the control loop touches outside its own memory goes through
//! one of these traits. The ESP-IDF implementations live in `platform`, the
//! in-memory ones in `sim`.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{DisplayError, HttpError, LinkError, TimeSyncError};

/// Character display addressed by column and row.
pub trait CharDisplay {
    fn columns(&self) -> usize;

    fn rows(&self) -> usize;

    fn clear(&mut self) -> Result<(), DisplayError>;

    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError>;

    /// Write text at the cursor, advancing it.
    fn write(&mut self, text: &str) -> Result<(), DisplayError>;
}

/// WiFi station interface.
pub trait WifiLink {
    /// Power up the radio in station mode.
    fn activate(&mut self) -> Result<(), LinkError>;

    /// Start associating with `ssid`. Returns without waiting for the link.
    fn connect(&mut self, ssid: &str, passphrase: &str) -> Result<(), LinkError>;

    /// True once associated and holding an IP address.
    fn is_connected(&mut self) -> bool;

    fn ip_address(&mut self) -> Option<String>;
}

/// Network time client.
pub trait NetworkTime {
    /// Fetch authoritative UTC and apply it to the system clock.
    fn set_time(&mut self) -> Result<(), TimeSyncError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

pub trait HttpClient {
    fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError>;
}

/// Wall clock, monotonic uptime and blocking sleep.
pub trait Clock {
    /// Seconds since the Unix epoch, UTC. Wrong until time sync succeeds.
    fn unix_time(&self) -> i64;

    /// Monotonic time since boot.
    fn uptime(&self) -> Duration;

    fn sleep(&mut self, duration: Duration);
}

/// Bundle of concrete driver types a device is built from.
pub trait Board {
    type Display: CharDisplay;
    type Wifi: WifiLink;
    type Time: NetworkTime;
    type Http: HttpClient;
    type Clock: Clock;
}

/// Owned driver instances for one [`Board`].
pub struct Hardware<B: Board> {
    pub display: B::Display,
    pub wifi: B::Wifi,
    pub time: B::Time,
    pub http: B::Http,
    pub clock: B::Clock,
}

/// Bounded retry: fixed attempt cap, fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}
