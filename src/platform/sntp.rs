use std::thread;
use std::time::Duration;

use esp_idf_svc::sntp::{EspSntp, OperatingMode, SntpConf, SyncMode, SyncStatus};
use log::info;

use crate::error::TimeSyncError;
use crate::hal::NetworkTime;

const SNTP_SERVER: &str = "pool.ntp.org";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// SNTP client. The first attempt starts the service; every attempt then
/// waits up to `window` for the sync status to complete.
pub struct SntpTime {
    sntp: Option<EspSntp<'static>>,
    window: Duration,
}

impl SntpTime {
    pub fn new(window: Duration) -> Self {
        Self { sntp: None, window }
    }
}

impl NetworkTime for SntpTime {
    fn set_time(&mut self) -> Result<(), TimeSyncError> {
        if self.sntp.is_none() {
            let conf = SntpConf {
                servers: [SNTP_SERVER, "time.nist.gov"],
                sync_mode: SyncMode::Immediate,
                operating_mode: OperatingMode::Poll,
            };
            info!("Starting SNTP sync with {}", SNTP_SERVER);
            let sntp = EspSntp::new_with_callback(&conf, |_| {
                info!("SNTP sync callback triggered");
            })
            .map_err(|e| TimeSyncError::Unavailable(e.to_string()))?;
            self.sntp = Some(sntp);
        }
        let Some(sntp) = self.sntp.as_ref() else {
            return Err(TimeSyncError::Unavailable("SNTP not running".into()));
        };

        let mut waited = Duration::ZERO;
        while waited < self.window {
            if sntp.get_sync_status() == SyncStatus::Completed {
                info!("SNTP time synchronized after {}ms", waited.as_millis());
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
            waited += POLL_INTERVAL;
        }
        Err(TimeSyncError::Timeout { waited })
    }
}
