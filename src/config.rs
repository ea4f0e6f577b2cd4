use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::weather::WeatherResponseShape;

const DEFAULT_UTC_OFFSET_SECS: i64 = 3600;
const MIN_UTC_OFFSET_SECS: i64 = -12 * 3600;
const MAX_UTC_OFFSET_SECS: i64 = 14 * 3600;

/// Coordinates to fall back on when IP geolocation keeps failing.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub ssid: String,
    pub passphrase: String,
    pub api_key: String,
    /// Fixed offset added to UTC for the clock. No DST rules.
    pub utc_offset_secs: i64,
    pub weather_shape: WeatherResponseShape,
    pub fallback_location: Option<FallbackLocation>,
}

/// On-disk layout. Key names match the file written for the device.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(rename = "SSID")]
    ssid: Option<String>,
    #[serde(rename = "pass")]
    pass: Option<String>,
    #[serde(rename = "API_KEY")]
    api_key: Option<String>,
    #[serde(rename = "UTC_OFFSET")]
    utc_offset: Option<i64>,
    #[serde(rename = "WEATHER_SHAPE")]
    weather_shape: Option<String>,
    #[serde(rename = "LAT")]
    lat: Option<f64>,
    #[serde(rename = "LON")]
    lon: Option<f64>,
    #[serde(rename = "CITY")]
    city: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField(field)),
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    range: std::ops::RangeInclusive<f64>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
        })
    }
}

impl Config {
    /// Read and validate the JSON config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        info!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Config, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text)?;

        let ssid = required(raw.ssid, "SSID")?;
        info!("config SSID = {:?}", ssid);

        // Open networks have an empty passphrase, but the key must be present.
        let passphrase = raw.pass.ok_or(ConfigError::MissingField("pass"))?;
        info!("config pass = <{} chars>", passphrase.len());

        let api_key = required(raw.api_key, "API_KEY")?;
        info!("config API_KEY = <{} chars>", api_key.len());

        let utc_offset_secs = raw.utc_offset.unwrap_or(DEFAULT_UTC_OFFSET_SECS);
        if !(MIN_UTC_OFFSET_SECS..=MAX_UTC_OFFSET_SECS).contains(&utc_offset_secs) {
            return Err(ConfigError::OutOfRange {
                field: "UTC_OFFSET",
                value: utc_offset_secs.to_string(),
            });
        }
        info!("config UTC_OFFSET = {}s", utc_offset_secs);

        let weather_shape = match raw.weather_shape.as_deref() {
            None => WeatherResponseShape::default(),
            Some(s) => WeatherResponseShape::parse(s).ok_or_else(|| ConfigError::OutOfRange {
                field: "WEATHER_SHAPE",
                value: s.to_string(),
            })?,
        };
        info!("config WEATHER_SHAPE = {}", weather_shape.as_str());

        let fallback_location = match (raw.lat, raw.lon) {
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingField("LON")),
            (None, Some(_)) => return Err(ConfigError::MissingField("LAT")),
            (Some(latitude), Some(longitude)) => {
                check_range("LAT", latitude, -90.0..=90.0)?;
                check_range("LON", longitude, -180.0..=180.0)?;
                let city = raw.city.unwrap_or_default();
                info!(
                    "config fallback location = {} ({}, {})",
                    city, latitude, longitude
                );
                Some(FallbackLocation {
                    latitude,
                    longitude,
                    city,
                })
            }
        };

        Ok(Config {
            ssid,
            passphrase,
            api_key,
            utc_offset_secs,
            weather_shape,
            fallback_location,
        })
    }
}
