//! WiFi weather clock for a 16x2 character LCD.
//!
//! The control logic is written against the traits in [`hal`] and runs on
//! the host against [`sim`]; the ESP-IDF drivers live in `platform`.

pub mod config;
pub mod connectivity;
pub mod controller;
pub mod display;
pub mod error;
pub mod geo;
pub mod hal;
pub mod sim;
pub mod time_sync;
pub mod weather;

#[cfg(target_os = "espidf")]
pub mod platform;

pub use config::Config;
pub use controller::{Device, DevicePhase, Timing};
