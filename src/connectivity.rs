use std::time::Duration;

use log::{info, warn};

use crate::config::Config;
use crate::display::DisplayAdapter;
use crate::error::ConnectivityError;
use crate::hal::{CharDisplay, Clock, RetryPolicy, WifiLink};

pub const CONNECT_POLICY: RetryPolicy = RetryPolicy::new(20, Duration::from_secs(1));
pub const RECONNECT_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of a steady-state link check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Link was up and still is.
    Up,
    /// Link was down and a reconnect just brought it back.
    Restored,
    Down,
}

pub struct ConnectivityManager<W> {
    wifi: W,
    state: ConnectionState,
    policy: RetryPolicy,
    reconnect_window: Duration,
    last_reconnect: Option<Duration>,
    ip_address: Option<String>,
}

impl<W: WifiLink> ConnectivityManager<W> {
    pub fn new(wifi: W, policy: RetryPolicy, reconnect_window: Duration) -> Self {
        Self {
            wifi,
            state: ConnectionState::Disconnected,
            policy,
            reconnect_window,
            last_reconnect: None,
            ip_address: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Bring the radio up and associate, polling the link at most
    /// `policy.attempts` times with `policy.delay` between polls.
    pub fn connect<D: CharDisplay, C: Clock>(
        &mut self,
        config: &Config,
        display: &mut DisplayAdapter<D>,
        clock: &mut C,
    ) -> Result<ConnectionState, ConnectivityError> {
        if let Err(e) = self.wifi.activate() {
            self.state = ConnectionState::Disconnected;
            return Err(ConnectivityError::Radio(e));
        }
        self.associate(config, display, clock)
    }

    fn associate<D: CharDisplay, C: Clock>(
        &mut self,
        config: &Config,
        display: &mut DisplayAdapter<D>,
        clock: &mut C,
    ) -> Result<ConnectionState, ConnectivityError> {
        self.state = ConnectionState::Connecting;
        info!("WiFi connecting to '{}'...", config.ssid);

        // A rejected request still leaves the driver retrying on its own,
        // so keep polling the link rather than giving up here.
        if let Err(e) = self.wifi.connect(&config.ssid, &config.passphrase) {
            warn!("WiFi connect request failed: {}", e);
        }

        let started = clock.uptime();
        let cap = self.policy.attempts;
        for attempt in 1..=cap {
            if self.wifi.is_connected() {
                self.state = ConnectionState::Connected;
                self.ip_address = self.wifi.ip_address();
                let elapsed_ms = clock.uptime().saturating_sub(started).as_millis();
                info!(
                    "WiFi connected on attempt {} ({}ms), IP: {}",
                    attempt,
                    elapsed_ms,
                    self.ip_address.as_deref().unwrap_or("?")
                );
                return Ok(ConnectionState::Connected);
            }
            display.progress("Connecting WiFi", &format!("Try {}/{}", attempt, cap));
            clock.sleep(self.policy.delay);
        }

        self.state = ConnectionState::Disconnected;
        self.ip_address = None;
        warn!("WiFi failed after {} attempts", cap);
        Err(ConnectivityError::Exhausted { attempts: cap })
    }

    /// Steady-state link check. On a drop, reconnects with the same bounded
    /// protocol, at most once per reconnect window.
    pub fn ensure_connected<D: CharDisplay, C: Clock>(
        &mut self,
        now: Duration,
        config: &Config,
        display: &mut DisplayAdapter<D>,
        clock: &mut C,
    ) -> LinkStatus {
        if self.wifi.is_connected() {
            if self.state == ConnectionState::Connected {
                return LinkStatus::Up;
            }
            info!("WiFi link back up");
            self.state = ConnectionState::Connected;
            self.ip_address = self.wifi.ip_address();
            return LinkStatus::Restored;
        }

        if self.state == ConnectionState::Connected {
            warn!("WiFi link lost");
            self.state = ConnectionState::Disconnected;
            self.ip_address = None;
            // A fresh drop gets an immediate reconnect.
            self.last_reconnect = None;
        }

        if let Some(last) = self.last_reconnect {
            if now.saturating_sub(last) < self.reconnect_window {
                return LinkStatus::Down;
            }
        }
        self.last_reconnect = Some(now);

        info!("WiFi reconnect window reached; attempting reconnect...");
        match self.associate(config, display, clock) {
            Ok(_) => LinkStatus::Restored,
            Err(e) => {
                warn!(
                    "WiFi reconnect failed: {}; retrying in {}s",
                    e,
                    self.reconnect_window.as_secs()
                );
                LinkStatus::Down
            }
        }
    }
}
