use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;

use crate::config::FallbackLocation;
use crate::display::DisplayAdapter;
use crate::error::LocationError;
use crate::hal::{CharDisplay, Clock, HttpClient, RetryPolicy};

pub const GEO_URL: &str = "http://ip-api.com/json/";
pub const GEO_POLICY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(2));

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    /// Uptime at which the location was obtained.
    pub resolved_at: Duration,
}

impl Location {
    pub fn from_fallback(fallback: &FallbackLocation, now: Duration) -> Self {
        Self {
            latitude: fallback.latitude,
            longitude: fallback.longitude,
            city: fallback.city.clone(),
            resolved_at: now,
        }
    }
}

// ── ip-api JSON ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct IpApiRoot {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
}

pub fn parse_location(json: &str, now: Duration) -> Result<Location, LocationError> {
    let root: IpApiRoot = serde_json::from_str(json)?;

    if root.status.as_deref() == Some("fail") {
        return Err(LocationError::Rejected(
            root.message.unwrap_or_else(|| "unknown reason".to_string()),
        ));
    }

    let latitude = root.lat.ok_or(LocationError::MissingField("lat"))?;
    let longitude = root.lon.ok_or(LocationError::MissingField("lon"))?;

    Ok(Location {
        latitude,
        longitude,
        city: root.city.unwrap_or_default(),
        resolved_at: now,
    })
}

pub struct GeoResolver {
    url: String,
    policy: RetryPolicy,
}

impl GeoResolver {
    pub fn new(url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            policy,
        }
    }

    /// One lookup of the device's location from its public IP.
    pub fn resolve<H: HttpClient, D: CharDisplay>(
        &self,
        http: &mut H,
        display: &mut DisplayAdapter<D>,
        now: Duration,
    ) -> Result<Location, LocationError> {
        display.progress("Getting location", "via IP...");

        let response = http.get(&self.url)?;
        if !response.is_success() {
            return Err(LocationError::Status(response.status));
        }
        let location = parse_location(&response.body, now)?;
        info!(
            "Location: {} {} {}",
            location.city, location.latitude, location.longitude
        );
        Ok(location)
    }

    /// [`resolve`](Self::resolve) with bounded retry. Returns the last error
    /// once every attempt has failed.
    pub fn resolve_with_retry<H: HttpClient, D: CharDisplay, C: Clock>(
        &self,
        http: &mut H,
        display: &mut DisplayAdapter<D>,
        clock: &mut C,
    ) -> Result<Location, LocationError> {
        let attempts = self.policy.attempts;
        let mut attempt = 1;
        loop {
            match self.resolve(http, display, clock.uptime()) {
                Ok(location) => return Ok(location),
                Err(e) if attempt < attempts => {
                    warn!("Location attempt {}/{} failed: {}", attempt, attempts, e);
                    clock.sleep(self.policy.delay);
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Location attempt {}/{} failed: {}", attempt, attempts, e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::hal::HttpResponse;
    use crate::sim::{ManualClock, SimDisplay, SimHttp};

    const PRAGUE: &str =
        r#"{"status":"success","country":"Czechia","city":"Prague","lat":50.5,"lon":14.2}"#;

    #[test]
    fn parses_coordinates_and_city() {
        let loc = parse_location(PRAGUE, Duration::from_secs(7)).unwrap();
        assert_eq!(loc.latitude, 50.5);
        assert_eq!(loc.longitude, 14.2);
        assert_eq!(loc.city, "Prague");
        assert_eq!(loc.resolved_at, Duration::from_secs(7));
    }

    #[test]
    fn city_defaults_to_empty() {
        let loc = parse_location(r#"{"lat": 1.5, "lon": -2.25}"#, Duration::ZERO).unwrap();
        assert_eq!(loc.city, "");
    }

    #[test]
    fn missing_coordinates_are_errors() {
        let err = parse_location(r#"{"lon": 3.0}"#, Duration::ZERO).unwrap_err();
        assert!(matches!(err, LocationError::MissingField("lat")));
        let err = parse_location(r#"{"lat": 3.0}"#, Duration::ZERO).unwrap_err();
        assert!(matches!(err, LocationError::MissingField("lon")));
        let err = parse_location("<html>", Duration::ZERO).unwrap_err();
        assert!(matches!(err, LocationError::Malformed(_)));
    }

    #[test]
    fn service_failure_status_is_rejected() {
        let err = parse_location(
            r#"{"status":"fail","message":"reserved range"}"#,
            Duration::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, LocationError::Rejected(ref m) if m == "reserved range"));
    }

    #[test]
    fn resolve_shows_progress_and_checks_status() {
        let lcd = SimDisplay::new(16, 2);
        let mut display = DisplayAdapter::new(lcd.clone());
        let http = SimHttp::new();
        http.on(GEO_URL, Ok(HttpResponse::new(503, "busy")));
        let resolver = GeoResolver::new(GEO_URL, GEO_POLICY);

        let err = resolver
            .resolve(&mut http.clone(), &mut display, Duration::ZERO)
            .unwrap_err();

        assert!(matches!(err, LocationError::Status(503)));
        assert_eq!(lcd.row(0), "Getting location");
        assert_eq!(lcd.row(1), "via IP...       ");
    }

    #[test]
    fn retry_recovers_from_transient_failure() {
        let mut display = DisplayAdapter::new(SimDisplay::new(16, 2));
        let mut clock = ManualClock::new(0);
        let http = SimHttp::new();
        http.on(GEO_URL, Err(HttpError::Transport("timeout".into())))
            .on(GEO_URL, Ok(HttpResponse::new(200, PRAGUE)));
        let resolver = GeoResolver::new(GEO_URL, GEO_POLICY);

        let loc = resolver
            .resolve_with_retry(&mut http.clone(), &mut display, &mut clock)
            .unwrap();

        assert_eq!(loc.city, "Prague");
        assert_eq!(http.request_count(GEO_URL), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn retry_gives_up_after_the_cap() {
        let mut display = DisplayAdapter::new(SimDisplay::new(16, 2));
        let mut clock = ManualClock::new(0);
        let http = SimHttp::new();
        http.on(GEO_URL, Ok(HttpResponse::new(200, "{}")));
        let resolver = GeoResolver::new(GEO_URL, GEO_POLICY);

        let err = resolver
            .resolve_with_retry(&mut http.clone(), &mut display, &mut clock)
            .unwrap_err();

        assert!(matches!(err, LocationError::MissingField("lat")));
        assert_eq!(http.request_count(GEO_URL), 3);
        assert_eq!(clock.sleeps().len(), 2);
    }
}
