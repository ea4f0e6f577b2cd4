use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;

use crate::error::WeatherFetchError;
use crate::geo::Location;
use crate::hal::HttpClient;

pub const OWM_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(600);
const FAILURE_WARN_EVERY: u32 = 10;

// ── Data types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSample {
    pub temperature_c: f32,
    pub humidity_pct: i32,
    pub pressure_hpa: i32,
    /// Uptime at which the sample was fetched.
    pub fetched_at: Duration,
}

/// Which OpenWeatherMap endpoint is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeatherResponseShape {
    /// `/weather`: readings under `main`.
    #[default]
    Current,
    /// `/forecast`: readings under `list[0].main`.
    Forecast,
}

impl WeatherResponseShape {
    pub fn as_str(self) -> &'static str {
        match self {
            WeatherResponseShape::Current => "current",
            WeatherResponseShape::Forecast => "forecast",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" | "weather" => Some(WeatherResponseShape::Current),
            "forecast" => Some(WeatherResponseShape::Forecast),
            _ => None,
        }
    }

    fn endpoint(self) -> &'static str {
        match self {
            WeatherResponseShape::Current => "weather",
            WeatherResponseShape::Forecast => "forecast",
        }
    }
}

// ── OWM JSON structures ─────────────────────────────────────────────

#[derive(Deserialize)]
struct OwmCurrentRoot {
    main: Option<OwmMain>,
}

#[derive(Deserialize)]
struct OwmForecastRoot {
    list: Option<Vec<OwmForecastEntry>>,
}

#[derive(Deserialize)]
struct OwmForecastEntry {
    main: Option<OwmMain>,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

// ── Parsing ─────────────────────────────────────────────────────────

fn sample_from_main(
    main: Option<OwmMain>,
    fetched_at: Duration,
) -> Result<WeatherSample, WeatherFetchError> {
    let main = main.ok_or(WeatherFetchError::MissingField("main"))?;
    let temp = main.temp.ok_or(WeatherFetchError::MissingField("main.temp"))?;
    let humidity = main
        .humidity
        .ok_or(WeatherFetchError::MissingField("main.humidity"))?;
    let pressure = main
        .pressure
        .ok_or(WeatherFetchError::MissingField("main.pressure"))?;

    Ok(WeatherSample {
        temperature_c: temp as f32,
        humidity_pct: humidity.round() as i32,
        pressure_hpa: pressure.round() as i32,
        fetched_at,
    })
}

pub fn parse_weather(
    shape: WeatherResponseShape,
    json: &str,
    fetched_at: Duration,
) -> Result<WeatherSample, WeatherFetchError> {
    match shape {
        WeatherResponseShape::Current => {
            let root: OwmCurrentRoot = serde_json::from_str(json)?;
            sample_from_main(root.main, fetched_at)
        }
        WeatherResponseShape::Forecast => {
            let root: OwmForecastRoot = serde_json::from_str(json)?;
            let first = root
                .list
                .and_then(|list| list.into_iter().next())
                .ok_or(WeatherFetchError::MissingField("list[0]"))?;
            sample_from_main(first.main, fetched_at)
        }
    }
}

pub fn weather_url(
    shape: WeatherResponseShape,
    location: &Location,
    api_key: &str,
) -> String {
    let mut url = format!(
        "{}/{}?lat={}&lon={}&appid={}&units=metric",
        OWM_BASE_URL,
        shape.endpoint(),
        location.latitude,
        location.longitude,
        api_key
    );
    // Only the first forecast slot is shown.
    if shape == WeatherResponseShape::Forecast {
        url.push_str("&cnt=1");
    }
    url
}

/// The URL with the API key blanked out, for logs.
fn redacted(url: &str, api_key: &str) -> String {
    url.replace(api_key, "***")
}

// ── Poller ──────────────────────────────────────────────────────────

pub struct WeatherPoller {
    api_key: String,
    shape: WeatherResponseShape,
    interval: Duration,
    sample: Option<WeatherSample>,
    consecutive_failures: u32,
}

impl WeatherPoller {
    pub fn new(api_key: impl Into<String>, shape: WeatherResponseShape, interval: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            shape,
            interval,
            sample: None,
            consecutive_failures: 0,
        }
    }

    pub fn sample(&self) -> Option<&WeatherSample> {
        self.sample.as_ref()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// True when there is no sample yet or the current one is at least one
    /// refresh interval old.
    pub fn is_due(&self, now: Duration) -> bool {
        match &self.sample {
            None => true,
            Some(s) => now.saturating_sub(s.fetched_at) >= self.interval,
        }
    }

    /// Fetch a new sample if one is due. A failed fetch keeps the previous
    /// sample untouched; the error is logged, never returned.
    pub fn maybe_refresh<H: HttpClient>(
        &mut self,
        now: Duration,
        location: &Location,
        http: &mut H,
    ) -> Option<&WeatherSample> {
        if self.is_due(now) {
            match self.fetch(now, location, http) {
                Ok(sample) => {
                    info!(
                        "Weather: {:.1}°C {}% {}hPa",
                        sample.temperature_c, sample.humidity_pct, sample.pressure_hpa
                    );
                    self.consecutive_failures = 0;
                    self.sample = Some(sample);
                }
                Err(e) => {
                    self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                    if self.consecutive_failures == 1
                        || self.consecutive_failures % FAILURE_WARN_EVERY == 0
                    {
                        warn!(
                            "Weather fetch failed ({} consecutive): {}",
                            self.consecutive_failures, e
                        );
                    } else {
                        info!("Weather fetch failed ({} consecutive)", self.consecutive_failures);
                    }
                }
            }
        }
        self.sample.as_ref()
    }

    pub fn fetch<H: HttpClient>(
        &self,
        now: Duration,
        location: &Location,
        http: &mut H,
    ) -> Result<WeatherSample, WeatherFetchError> {
        let url = weather_url(self.shape, location, &self.api_key);
        info!("Fetching weather: {}", redacted(&url, &self.api_key));

        let response = http.get(&url)?;
        if !response.is_success() {
            return Err(WeatherFetchError::Status(response.status));
        }
        parse_weather(self.shape, &response.body, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::hal::HttpResponse;
    use crate::sim::SimHttp;

    const CURRENT: &str = r#"{"coord":{"lon":14.2,"lat":50.5},
        "main":{"temp":21.3,"feels_like":20.9,"pressure":1012,"humidity":55},
        "name":"Prague"}"#;
    const FORECAST: &str = r#"{"cod":"200","cnt":1,
        "list":[{"dt":1700000000,"main":{"temp":-3.46,"pressure":1030,"humidity":91}}]}"#;

    fn prague() -> Location {
        Location {
            latitude: 50.5,
            longitude: 14.2,
            city: "Prague".into(),
            resolved_at: Duration::ZERO,
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn parses_current_shape() {
        let s = parse_weather(WeatherResponseShape::Current, CURRENT, secs(3)).unwrap();
        assert_eq!(s.temperature_c, 21.3);
        assert_eq!(s.humidity_pct, 55);
        assert_eq!(s.pressure_hpa, 1012);
        assert_eq!(s.fetched_at, secs(3));
    }

    #[test]
    fn parses_forecast_shape() {
        let s = parse_weather(WeatherResponseShape::Forecast, FORECAST, secs(0)).unwrap();
        assert_eq!(s.temperature_c, -3.46);
        assert_eq!(s.humidity_pct, 91);
        assert_eq!(s.pressure_hpa, 1030);
    }

    #[test]
    fn missing_fields_are_reported() {
        let err = parse_weather(WeatherResponseShape::Current, r#"{"cod":401}"#, secs(0))
            .unwrap_err();
        assert!(matches!(err, WeatherFetchError::MissingField("main")));

        let err = parse_weather(
            WeatherResponseShape::Current,
            r#"{"main":{"temp":1.0,"humidity":2}}"#,
            secs(0),
        )
        .unwrap_err();
        assert!(matches!(err, WeatherFetchError::MissingField("main.pressure")));

        let err = parse_weather(WeatherResponseShape::Forecast, r#"{"list":[]}"#, secs(0))
            .unwrap_err();
        assert!(matches!(err, WeatherFetchError::MissingField("list[0]")));
    }

    #[test]
    fn url_carries_coordinates_key_and_units() {
        let url = weather_url(WeatherResponseShape::Current, &prague(), "KEY");
        assert_eq!(
            url,
            "https://api.openweathermap.org/data/2.5/weather?lat=50.5&lon=14.2&appid=KEY&units=metric"
        );
        let url = weather_url(WeatherResponseShape::Forecast, &prague(), "KEY");
        assert!(url.starts_with("https://api.openweathermap.org/data/2.5/forecast?"));
        assert!(url.ends_with("&units=metric&cnt=1"));
        assert_eq!(redacted(&url, "KEY").matches("***").count(), 1);
    }

    #[test]
    fn shape_names_parse() {
        assert_eq!(
            WeatherResponseShape::parse(" Forecast "),
            Some(WeatherResponseShape::Forecast)
        );
        assert_eq!(WeatherResponseShape::parse("hourly"), None);
    }

    #[test]
    fn fetches_only_when_due() {
        let http = SimHttp::new();
        http.on(OWM_BASE_URL, Ok(HttpResponse::new(200, CURRENT)));
        let mut poller = WeatherPoller::new("k", WeatherResponseShape::Current, REFRESH_INTERVAL);
        let loc = prague();

        assert!(poller.maybe_refresh(secs(10), &loc, &mut http.clone()).is_some());
        assert_eq!(http.request_count(OWM_BASE_URL), 1);

        poller.maybe_refresh(secs(11), &loc, &mut http.clone());
        poller.maybe_refresh(secs(609), &loc, &mut http.clone());
        assert_eq!(http.request_count(OWM_BASE_URL), 1);

        let s = poller.maybe_refresh(secs(610), &loc, &mut http.clone()).unwrap();
        assert_eq!(s.fetched_at, secs(610));
        assert_eq!(http.request_count(OWM_BASE_URL), 2);
    }

    #[test]
    fn failed_fetch_keeps_previous_sample() {
        let http = SimHttp::new();
        http.on(OWM_BASE_URL, Ok(HttpResponse::new(200, CURRENT)))
            .on(OWM_BASE_URL, Ok(HttpResponse::new(500, "oops")))
            .on(OWM_BASE_URL, Err(HttpError::Transport("reset".into())));
        let mut poller = WeatherPoller::new("k", WeatherResponseShape::Current, REFRESH_INTERVAL);
        let loc = prague();

        let first = poller.maybe_refresh(secs(0), &loc, &mut http.clone()).cloned().unwrap();

        let after_status = poller.maybe_refresh(secs(600), &loc, &mut http.clone()).cloned();
        assert_eq!(after_status, Some(first.clone()));
        assert_eq!(poller.consecutive_failures(), 1);

        // Still due, so the next call tries again and fails again.
        let after_transport = poller.maybe_refresh(secs(601), &loc, &mut http.clone()).cloned();
        assert_eq!(after_transport.map(|s| s.fetched_at), Some(secs(0)));
        assert_eq!(poller.consecutive_failures(), 2);
        assert_eq!(http.request_count(OWM_BASE_URL), 3);
    }

    #[test]
    fn no_sample_means_fetch_every_call() {
        let http = SimHttp::new();
        http.on(OWM_BASE_URL, Ok(HttpResponse::new(200, "not json")));
        let mut poller = WeatherPoller::new("k", WeatherResponseShape::Current, REFRESH_INTERVAL);
        let loc = prague();

        for t in 0..3 {
            assert!(poller.maybe_refresh(secs(t), &loc, &mut http.clone()).is_none());
        }
        assert_eq!(http.request_count(OWM_BASE_URL), 3);
    }
}
