//! # twcbus - Tesla Wall Connector 3 bridge for Victron Venus OS
//!
//! Polls the Wall Connector's local HTTP API and publishes the readings on
//! D-Bus as two Venus OS devices: an EV charger and a temperature sensor
//! used as a display proxy.
//!
//! ## Architecture
//!
//! - `twc`: HTTP client for the charger's `version`, `vitals` and `lifetime` endpoints
//! - `metrics`: derivation of published values from raw readings
//! - `dbus`: `com.victronenergy.BusItem` services on zbus
//! - `publisher`: the charger and temperature services and their paths
//! - `controls`: writable-path capability (no hardware action)
//! - `driver`: fast/slow update scheduler and host selection
//! - `config`: YAML configuration
//! - `logging`: structured logging and tracing

pub mod config;
pub mod controls;
pub mod dbus;
pub mod driver;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod publisher;
pub mod twc;

#[cfg(test)]
mod config_tests;

// Re-export commonly used types
pub use config::Config;
pub use driver::Bridge;
pub use error::{BridgeError, Result};
