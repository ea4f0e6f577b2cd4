use std::time::Duration;

use lcd_weather_clock::controller::compose_frame;
use lcd_weather_clock::geo::GEO_URL;
use lcd_weather_clock::hal::{Hardware, HttpResponse};
use lcd_weather_clock::sim::{ManualClock, SimBoard, SimDisplay, SimHttp, SimNtp, SimWifi};
use lcd_weather_clock::time_sync::format_clock;
use lcd_weather_clock::weather::OWM_BASE_URL;
use lcd_weather_clock::{Config, Device, DevicePhase, Timing};

const CONFIG: &str = r#"{"SSID":"home","pass":"secret","API_KEY":"abc123"}"#;
const PRAGUE: &str = r#"{"status":"success","lat":50.5,"lon":14.2,"city":"Prague"}"#;
const WEATHER: &str = r#"{"main":{"temp":21.3,"humidity":55,"pressure":1012}}"#;

struct Rig {
    lcd: SimDisplay,
    wifi: SimWifi,
    ntp: SimNtp,
    http: SimHttp,
    clock: ManualClock,
}

fn build(wifi: SimWifi, ntp: SimNtp, http: SimHttp, clock: ManualClock) -> (Device<SimBoard>, Rig) {
    let rig = Rig {
        lcd: SimDisplay::new(16, 2),
        wifi,
        ntp,
        http,
        clock,
    };
    let hw = Hardware::<SimBoard> {
        display: rig.lcd.clone(),
        wifi: rig.wifi.clone(),
        time: rig.ntp.clone(),
        http: rig.http.clone(),
        clock: rig.clock.clone(),
    };
    let config = Config::from_json(CONFIG).unwrap();
    (Device::new(config, hw, Timing::default()), rig)
}

#[test]
fn full_boot_renders_weather_on_an_unsynced_clock() {
    let http = SimHttp::new();
    http.on(GEO_URL, Ok(HttpResponse::new(200, PRAGUE)));
    http.on(OWM_BASE_URL, Ok(HttpResponse::new(200, WEATHER)));
    let (mut dev, rig) = build(
        SimWifi::connecting_on_poll(3),
        SimNtp::failing(),
        http,
        ManualClock::new(0),
    );

    dev.start().unwrap();
    assert_eq!(dev.phase(), DevicePhase::Running);
    assert_eq!(rig.wifi.polls(), 3);
    assert_eq!(rig.ntp.attempts(), 5);
    assert!(!dev.is_time_synced());

    // Two 1 s WiFi polls, then four 2 s pauses between sync attempts.
    let sleeps = rig.clock.sleeps();
    assert_eq!(
        sleeps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(2),
        ]
    );

    let location = dev.location().unwrap();
    assert_eq!(location.city, "Prague");
    assert_eq!((location.latitude, location.longitude), (50.5, 14.2));

    let frame = dev.run_once(dev.uptime());
    // Unsynced clock: epoch + 10 s of boot, shown at the default +1 h.
    assert_eq!(frame.line0, "01:00:10 T:21.3 ");
    assert_eq!(frame.line1, "H:55% P:1012    ");
    assert_eq!(rig.lcd.row(0), frame.line0);
    assert_eq!(rig.lcd.row(1), frame.line1);

    let sample = dev.weather().unwrap();
    assert_eq!(sample.humidity_pct, 55);
    assert_eq!(sample.pressure_hpa, 1012);

    let weather_url = rig
        .http
        .requests()
        .into_iter()
        .find(|u| u.starts_with(OWM_BASE_URL))
        .unwrap();
    assert!(weather_url.contains("lat=50.5"));
    assert!(weather_url.contains("lon=14.2"));
    assert!(weather_url.contains("appid=abc123"));
    assert!(weather_url.contains("units=metric"));
}

#[test]
fn synced_clock_drives_the_time_field() {
    let http = SimHttp::new();
    http.on(GEO_URL, Ok(HttpResponse::new(200, PRAGUE)));
    http.on(OWM_BASE_URL, Ok(HttpResponse::new(200, WEATHER)));
    let clock = ManualClock::new(0);
    let (mut dev, _rig) = build(
        SimWifi::connecting_on_poll(1),
        SimNtp::succeeding_after(0, &clock, 1_700_000_000),
        http,
        clock.clone(),
    );

    dev.start().unwrap();
    assert!(dev.is_time_synced());
    let frame = dev.run_once(dev.uptime());
    assert_eq!(frame.line0, "23:13:20 T:21.3 ");
}

#[test]
fn failing_weather_keeps_rendering_no_data() {
    let http = SimHttp::new();
    http.on(GEO_URL, Ok(HttpResponse::new(200, PRAGUE)));
    http.on(OWM_BASE_URL, Ok(HttpResponse::new(503, "unavailable")));
    let (mut dev, rig) = build(
        SimWifi::connecting_on_poll(1),
        SimNtp::failing(),
        http,
        ManualClock::new(0),
    );
    dev.start().unwrap();

    for tick in 1..=12u64 {
        let now = dev.uptime();
        let frame = dev.run_once(now);
        let expected = format!("{} no data", format_clock(now.as_secs() as i64, 3600));
        assert_eq!(frame.line0, expected);
        assert_eq!(frame.line1, "weather error   ");
        assert_eq!(rig.lcd.row(1), "weather error   ");
        assert!(dev.weather().is_none());
        // Nothing to keep, so every tick is due.
        assert_eq!(rig.http.request_count(OWM_BASE_URL) as u64, tick);
        rig.clock.advance(Duration::from_secs(1));
    }
}

#[test]
fn sample_survives_a_later_failed_refresh() {
    let http = SimHttp::new();
    http.on(GEO_URL, Ok(HttpResponse::new(200, PRAGUE)));
    http.on(OWM_BASE_URL, Ok(HttpResponse::new(200, WEATHER)))
        .on(OWM_BASE_URL, Ok(HttpResponse::new(500, "")));
    let (mut dev, rig) = build(
        SimWifi::connecting_on_poll(1),
        SimNtp::failing(),
        http,
        ManualClock::new(0),
    );
    dev.start().unwrap();

    let t0 = dev.uptime();
    dev.run_once(t0);
    let fetched_at = dev.weather().unwrap().fetched_at;
    assert_eq!(fetched_at, t0);

    // Not due yet: no request.
    dev.run_once(t0 + Duration::from_secs(599));
    assert_eq!(rig.http.request_count(OWM_BASE_URL), 1);

    let frame = dev.run_once(t0 + Duration::from_secs(600));
    assert_eq!(rig.http.request_count(OWM_BASE_URL), 2);
    assert_eq!(dev.weather().unwrap().fetched_at, fetched_at);
    assert_eq!(frame.line1, "H:55% P:1012    ");
}

#[test]
fn every_rendered_line_fits_the_panel() {
    let long = lcd_weather_clock::weather::WeatherSample {
        temperature_c: -40.25,
        humidity_pct: 100,
        pressure_hpa: 10_130,
        fetched_at: Duration::ZERO,
    };
    let frame = compose_frame("12:34:56", Some(&long), 16);
    assert_eq!(frame.line0.chars().count(), 16);
    assert_eq!(frame.line1.chars().count(), 16);
}
