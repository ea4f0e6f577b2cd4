//! ESP-IDF drivers behind the `hal` traits.

pub mod http;
pub mod lcd;
pub mod sntp;
pub mod wifi;

use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::info;

use crate::hal::{Board, Clock};

/// Where the SPIFFS partition is mounted.
pub const MOUNT_POINT: &str = "/spiffs";
pub const CONFIG_PATH: &str = "/spiffs/config.json";

pub struct EspBoard;

impl Board for EspBoard {
    type Display = lcd::Lcd1602;
    type Wifi = wifi::StationLink;
    type Time = sntp::SntpTime;
    type Http = http::EspHttp;
    type Clock = EspClock;
}

/// System RTC for wall time, `esp_timer` for uptime.
pub struct EspClock;

impl Clock for EspClock {
    fn unix_time(&self) -> i64 {
        unsafe { libc::time(core::ptr::null_mut()) as i64 }
    }

    fn uptime(&self) -> Duration {
        let micros = unsafe { esp_idf_sys::esp_timer_get_time() };
        Duration::from_micros(micros.max(0) as u64)
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

pub fn esp_check(res: esp_idf_sys::esp_err_t, msg: &str) -> Result<()> {
    if res != esp_idf_sys::ESP_OK {
        Err(anyhow::anyhow!("{} (err {})", msg, res))
    } else {
        Ok(())
    }
}

/// Register the SPIFFS partition under [`MOUNT_POINT`] so std::fs can read it.
pub fn mount_spiffs() -> Result<()> {
    let conf = esp_idf_sys::esp_vfs_spiffs_conf_t {
        base_path: c"/spiffs".as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: false,
    };
    esp_check(
        unsafe { esp_idf_sys::esp_vfs_spiffs_register(&conf) },
        "spiffs_register",
    )?;
    info!("SPIFFS mounted at {}", MOUNT_POINT);
    Ok(())
}
