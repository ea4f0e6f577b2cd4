use std::time::Duration;

use thiserror::Error;

// ── Driver-level errors (returned by the hal traits) ────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    #[error("display bus error: {0}")]
    Bus(String),
    #[error("cursor ({col}, {row}) outside the display")]
    CursorOutOfRange { col: u8, row: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("wifi driver error: {0}")]
    Driver(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response too large (>{limit} bytes)")]
    TooLarge { limit: usize },
    #[error("response is not valid UTF-8")]
    Encoding,
}

// ── Component errors ────────────────────────────────────────────────

/// Missing or malformed persisted configuration. Fatal at boot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("config is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("config field {0} is missing or empty")]
    MissingField(&'static str),
    #[error("config field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
}

/// WiFi association failed. Fatal during startup, logged during steady state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectivityError {
    #[error("radio activation failed: {0}")]
    Radio(#[from] LinkError),
    #[error("no link after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeSyncError {
    #[error("time service unavailable: {0}")]
    Unavailable(String),
    #[error("no time sync within {waited:?}")]
    Timeout { waited: Duration },
    #[error("time sync failed after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("geolocation request failed: {0}")]
    Http(#[from] HttpError),
    #[error("geolocation service returned HTTP {0}")]
    Status(u16),
    #[error("geolocation response is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("geolocation service rejected the query: {0}")]
    Rejected(String),
    #[error("geolocation response lacks {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum WeatherFetchError {
    #[error("weather request failed: {0}")]
    Http(#[from] HttpError),
    #[error("weather service returned HTTP {0}")]
    Status(u16),
    #[error("weather response is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("weather response lacks {0}")]
    MissingField(&'static str),
}

impl ConfigError {
    /// Short text for the second display line.
    pub fn display_hint(&self) -> &'static str {
        match self {
            ConfigError::Io(_) => "file missing",
            ConfigError::Malformed(_) => "bad JSON",
            ConfigError::MissingField(field) => *field,
            ConfigError::OutOfRange { field, .. } => *field,
        }
    }
}
