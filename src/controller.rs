//! Device composition root and control loop.
//!
//! [`Device::start`] walks the startup phases once; [`Device::run_once`] is
//! a single steady-state tick and [`Device::run_forever`] only repeats it.

use std::time::Duration;

use log::{info, warn};

use crate::config::Config;
use crate::connectivity::{
    ConnectionState, ConnectivityManager, LinkStatus, CONNECT_POLICY, RECONNECT_WINDOW,
};
use crate::display::{DisplayAdapter, DisplayFrame};
use crate::error::ConnectivityError;
use crate::geo::{GeoResolver, Location, GEO_POLICY, GEO_URL};
use crate::hal::{Board, Clock, Hardware, RetryPolicy};
use crate::time_sync::{TimeSync, SYNC_POLICY};
use crate::weather::{WeatherPoller, WeatherSample, REFRESH_INTERVAL};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePhase {
    Booting,
    ConnectingWifi,
    SyncingTime,
    ResolvingLocation,
    Running,
}

/// Retry caps, delays and intervals used by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub wifi: RetryPolicy,
    pub time_sync: RetryPolicy,
    pub location: RetryPolicy,
    pub tick: Duration,
    pub weather_refresh: Duration,
    pub reconnect_window: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            wifi: CONNECT_POLICY,
            time_sync: SYNC_POLICY,
            location: GEO_POLICY,
            tick: TICK_INTERVAL,
            weather_refresh: REFRESH_INTERVAL,
            reconnect_window: RECONNECT_WINDOW,
        }
    }
}

/// The two lines for a tick, from the clock text and the latest sample.
pub fn compose_frame(time_txt: &str, sample: Option<&WeatherSample>, width: usize) -> DisplayFrame {
    match sample {
        Some(s) => DisplayFrame::new(
            &format!("{} T:{:.1}", time_txt, s.temperature_c),
            &format!("H:{}% P:{}", s.humidity_pct, s.pressure_hpa),
            width,
        ),
        None => DisplayFrame::new(&format!("{} no data", time_txt), "weather error", width),
    }
}

pub struct Device<B: Board> {
    phase: DevicePhase,
    config: Config,
    timing: Timing,
    display: DisplayAdapter<B::Display>,
    connectivity: ConnectivityManager<B::Wifi>,
    time: TimeSync<B::Time>,
    geo: GeoResolver,
    weather: WeatherPoller,
    http: B::Http,
    clock: B::Clock,
    location: Option<Location>,
    last_location_attempt: Option<Duration>,
}

impl<B: Board> Device<B> {
    pub fn new(config: Config, hw: Hardware<B>, timing: Timing) -> Self {
        let Hardware {
            display,
            wifi,
            time,
            http,
            clock,
        } = hw;
        let mut display = DisplayAdapter::new(display);
        display.progress("Weather clock", "Booting...");

        Self {
            phase: DevicePhase::Booting,
            connectivity: ConnectivityManager::new(wifi, timing.wifi, timing.reconnect_window),
            time: TimeSync::new(time, timing.time_sync, config.utc_offset_secs),
            geo: GeoResolver::new(GEO_URL, timing.location),
            weather: WeatherPoller::new(
                config.api_key.clone(),
                config.weather_shape,
                timing.weather_refresh,
            ),
            config,
            timing,
            display,
            http,
            clock,
            location: None,
            last_location_attempt: None,
        }
    }

    pub fn phase(&self) -> DevicePhase {
        self.phase
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn weather(&self) -> Option<&WeatherSample> {
        self.weather.sample()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connectivity.state()
    }

    pub fn is_time_synced(&self) -> bool {
        self.time.is_synced()
    }

    pub fn uptime(&self) -> Duration {
        self.clock.uptime()
    }

    /// Run the startup sequence. Only a WiFi failure is fatal; time and
    /// location problems degrade the display instead.
    pub fn start(&mut self) -> Result<(), ConnectivityError> {
        self.phase = DevicePhase::ConnectingWifi;
        info!("Phase: {:?}", self.phase);
        if let Err(e) = self
            .connectivity
            .connect(&self.config, &mut self.display, &mut self.clock)
        {
            self.display.progress("WiFi failed", "check config");
            return Err(e);
        }

        self.phase = DevicePhase::SyncingTime;
        info!("Phase: {:?}", self.phase);
        self.time.sync(&mut self.display, &mut self.clock);

        self.phase = DevicePhase::ResolvingLocation;
        info!("Phase: {:?}", self.phase);
        self.resolve_location();

        self.phase = DevicePhase::Running;
        info!("Phase: {:?}", self.phase);
        Ok(())
    }

    fn resolve_location(&mut self) {
        let now = self.clock.uptime();
        self.last_location_attempt = Some(now);
        match self
            .geo
            .resolve_with_retry(&mut self.http, &mut self.display, &mut self.clock)
        {
            Ok(location) => self.location = Some(location),
            Err(e) => match &self.config.fallback_location {
                Some(fallback) => {
                    warn!(
                        "Location unavailable ({}); using configured {} ({}, {})",
                        e, fallback.city, fallback.latitude, fallback.longitude
                    );
                    self.location = Some(Location::from_fallback(fallback, now));
                }
                None => {
                    warn!(
                        "Location unavailable ({}); retrying in {}s",
                        e,
                        self.timing.weather_refresh.as_secs()
                    );
                }
            },
        }
    }

    /// One steady-state tick at uptime `now`. Never fails: every error is
    /// turned into a degraded display line.
    pub fn run_once(&mut self, now: Duration) -> DisplayFrame {
        let link = self
            .connectivity
            .ensure_connected(now, &self.config, &mut self.display, &mut self.clock);

        if link == LinkStatus::Restored && !self.time.is_synced() {
            info!("Link restored with clock unsynchronized; syncing time");
            self.time.sync(&mut self.display, &mut self.clock);
        }

        if link != LinkStatus::Down {
            let retry_due = self
                .last_location_attempt
                .map_or(true, |t| now.saturating_sub(t) >= self.timing.weather_refresh);
            if self.location.is_none() && retry_due {
                self.resolve_location();
            }

            if let Some(location) = &self.location {
                if self.weather.is_due(now) {
                    self.display.progress("Updating weather", &location.city);
                    self.weather.maybe_refresh(now, location, &mut self.http);
                }
            }
        }

        let time_txt = self.time.clock_string(&self.clock);
        let frame = compose_frame(&time_txt, self.weather.sample(), self.display.columns());
        if let Err(e) = self.display.show(&frame) {
            warn!("display: frame not shown: {}", e);
        }
        frame
    }

    pub fn run_forever(&mut self) -> ! {
        info!("Entering main loop");
        loop {
            self.run_once(self.clock.uptime());
            self.clock.sleep(self.timing.tick);
        }
    }
}
