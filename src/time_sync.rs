use std::time::Duration;

use log::{info, warn};

use crate::display::DisplayAdapter;
use crate::error::TimeSyncError;
use crate::hal::{CharDisplay, Clock, NetworkTime, RetryPolicy};

pub const SYNC_POLICY: RetryPolicy = RetryPolicy::new(5, Duration::from_secs(2));

const SECS_PER_DAY: i64 = 86_400;

/// Format `unix_time + utc_offset_secs` as zero-padded `HH:MM:SS`.
pub fn format_clock(unix_time: i64, utc_offset_secs: i64) -> String {
    let secs = (unix_time + utc_offset_secs).rem_euclid(SECS_PER_DAY);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

pub struct TimeSync<N> {
    ntp: N,
    policy: RetryPolicy,
    utc_offset_secs: i64,
    synced: bool,
}

impl<N: NetworkTime> TimeSync<N> {
    pub fn new(ntp: N, policy: RetryPolicy, utc_offset_secs: i64) -> Self {
        Self {
            ntp,
            policy,
            utc_offset_secs,
            synced: false,
        }
    }

    /// Try to set the clock from the network. A failure leaves the local
    /// clock as it is; the device keeps running on it.
    pub fn sync<D: CharDisplay, C: Clock>(
        &mut self,
        display: &mut DisplayAdapter<D>,
        clock: &mut C,
    ) -> bool {
        let attempts = self.policy.attempts;
        for attempt in 1..=attempts {
            display.progress("Syncing time", &format!("Attempt {}", attempt));
            match self.ntp.set_time() {
                Ok(()) => {
                    self.synced = true;
                    info!(
                        "Time synchronized on attempt {}, local {}",
                        attempt,
                        self.clock_string(clock)
                    );
                    return true;
                }
                Err(e) => {
                    warn!("Time sync attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        clock.sleep(self.policy.delay);
                    }
                }
            }
        }
        warn!(
            "{}; continuing on unsynchronized clock",
            TimeSyncError::Exhausted { attempts }
        );
        false
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn clock_string<C: Clock>(&self, clock: &C) -> String {
        format_clock(clock.unix_time(), self.utc_offset_secs)
    }
}
