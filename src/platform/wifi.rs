use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
use log::info;

use crate::error::LinkError;
use crate::hal::WifiLink;

fn driver_err(e: impl core::fmt::Display) -> LinkError {
    LinkError::Driver(e.to_string())
}

/// Log WiFi/AP state from ESP-IDF internals.
fn log_wifi_diag(label: &str) {
    unsafe {
        let mut ap_info: esp_idf_sys::wifi_ap_record_t = core::mem::zeroed();
        let ap_rc = esp_idf_sys::esp_wifi_sta_get_ap_info(&mut ap_info);
        if ap_rc == esp_idf_sys::ESP_OK {
            let ssid = core::str::from_utf8(&ap_info.ssid)
                .unwrap_or("?")
                .trim_end_matches('\0');
            info!(
                "WiFi [{}]: assoc=YES rssi={} ch={} ssid={}",
                label, ap_info.rssi, ap_info.primary, ssid
            );
        } else {
            info!("WiFi [{}]: assoc=NO (ap_info err={})", label, ap_rc);
        }
    }
}

/// Station-mode radio. `connect` only starts association; the control loop
/// polls `is_connected` for the outcome.
pub struct StationLink {
    wifi: Box<EspWifi<'static>>,
    was_up: bool,
}

impl StationLink {
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> anyhow::Result<Self> {
        let wifi = EspWifi::new(modem, sysloop, None)?;
        Ok(Self {
            wifi: Box::new(wifi),
            was_up: false,
        })
    }
}

impl WifiLink for StationLink {
    fn activate(&mut self) -> Result<(), LinkError> {
        if self.wifi.is_started().map_err(driver_err)? {
            return Ok(());
        }
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))
            .map_err(driver_err)?;
        self.wifi.start().map_err(driver_err)?;
        info!("WiFi radio started (STA)");
        Ok(())
    }

    fn connect(&mut self, ssid: &str, passphrase: &str) -> Result<(), LinkError> {
        let auth = if passphrase.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let mut wifi_ssid = heapless::String::<32>::new();
        let mut wifi_pass = heapless::String::<64>::new();
        wifi_ssid
            .push_str(ssid)
            .map_err(|_| LinkError::Driver("SSID longer than 32 bytes".into()))?;
        wifi_pass
            .push_str(passphrase)
            .map_err(|_| LinkError::Driver("passphrase longer than 64 bytes".into()))?;

        // Drop any half-open association before reconfiguring.
        let _ = self.wifi.disconnect();
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: wifi_ssid,
                password: wifi_pass,
                auth_method: auth,
                ..Default::default()
            }))
            .map_err(driver_err)?;
        self.wifi.connect().map_err(driver_err)
    }

    fn is_connected(&mut self) -> bool {
        let up = self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false);
        if up != self.was_up {
            log_wifi_diag(if up { "up" } else { "down" });
            self.was_up = up;
        }
        up
    }

    fn ip_address(&mut self) -> Option<String> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip.to_string())
    }
}
