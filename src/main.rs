#[cfg(target_os = "espidf")]
mod firmware {
    use std::time::Duration;

    use anyhow::Result;
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::units::Hertz;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use log::{error, info};

    use lcd_weather_clock::display::DisplayAdapter;
    use lcd_weather_clock::hal::Hardware;
    use lcd_weather_clock::platform::{self, http, lcd, sntp, wifi, EspBoard, EspClock};
    use lcd_weather_clock::{Config, Device, Timing};

    const I2C_FREQ_HZ: u32 = 100_000;
    const SNTP_WINDOW: Duration = Duration::from_secs(5);
    /// How long a fatal message stays up before the task exits and the
    /// IDF restarts the chip.
    const FATAL_HOLD: Duration = Duration::from_secs(10);

    pub fn run() -> Result<()> {
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();

        info!("BOOT lcd_weather_clock v{}", env!("CARGO_PKG_VERSION"));

        // ── 1. Peripherals ──
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;

        // ── 2. LCD on I2C (SDA=GPIO0, SCL=GPIO1) ──
        let i2c_config = I2cConfig::new().baudrate(Hertz(I2C_FREQ_HZ));
        let i2c = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio0,
            peripherals.pins.gpio1,
            &i2c_config,
        )?;
        let mut display = DisplayAdapter::new(lcd::Lcd1602::init(i2c)?);
        display.progress("Weather clock", "Loading config");

        // ── 3. Config from SPIFFS ──
        let loaded = platform::mount_spiffs()
            .and_then(|()| Ok(Config::load(platform::CONFIG_PATH)?));
        let config = match loaded {
            Ok(config) => config,
            Err(e) => {
                error!("Config unusable: {:#}", e);
                let hint = e
                    .downcast_ref::<lcd_weather_clock::error::ConfigError>()
                    .map_or("no filesystem", |c| c.display_hint());
                display.progress("Config error", hint);
                std::thread::sleep(FATAL_HOLD);
                return Err(e);
            }
        };

        // ── 4. Drivers ──
        let hw = Hardware::<EspBoard> {
            display: display.into_inner(),
            wifi: wifi::StationLink::new(peripherals.modem, sysloop)?,
            time: sntp::SntpTime::new(SNTP_WINDOW),
            http: http::EspHttp,
            clock: EspClock,
        };

        // ── 5. Startup phases, then the loop ──
        let mut device = Device::new(config, hw, Timing::default());
        if let Err(e) = device.start() {
            error!("Startup failed: {}", e);
            std::thread::sleep(FATAL_HOLD);
            return Err(e.into());
        }
        device.run_forever()
    }
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

/// Host build: run the device against the in-memory board for a few ticks.
#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use std::time::Duration;

    use lcd_weather_clock::geo::GEO_URL;
    use lcd_weather_clock::hal::{Hardware, HttpResponse};
    use lcd_weather_clock::sim::{ManualClock, SimBoard, SimDisplay, SimHttp, SimNtp, SimWifi};
    use lcd_weather_clock::weather::OWM_BASE_URL;
    use lcd_weather_clock::{Config, Device, Timing};

    const CONFIG: &str = r#"{"SSID":"sim","pass":"sim","API_KEY":"demo","UTC_OFFSET":3600}"#;
    const TICKS: u32 = 5;

    let clock = ManualClock::new(0);
    let lcd = SimDisplay::new(16, 2);
    let http = SimHttp::new();
    http.on(
        GEO_URL,
        Ok(HttpResponse::new(
            200,
            r#"{"status":"success","lat":50.5,"lon":14.2,"city":"Prague"}"#,
        )),
    );
    http.on(
        OWM_BASE_URL,
        Ok(HttpResponse::new(
            200,
            r#"{"main":{"temp":21.3,"humidity":55,"pressure":1012}}"#,
        )),
    );

    let hw = Hardware::<SimBoard> {
        display: lcd.clone(),
        wifi: SimWifi::connecting_on_poll(3),
        time: SimNtp::succeeding_after(1, &clock, 1_700_000_000),
        http,
        clock: clock.clone(),
    };

    let mut device = Device::new(Config::from_json(CONFIG)?, hw, Timing::default());
    device.start()?;
    for _ in 0..TICKS {
        device.run_once(device.uptime());
        println!("+----------------+");
        println!("|{}|", lcd.row(0));
        println!("|{}|", lcd.row(1));
        println!("+----------------+");
        clock.advance(Duration::from_secs(1));
    }
    Ok(())
}
