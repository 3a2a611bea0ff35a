//! The two devices published for one Wall Connector
//!
//! The charger service carries the electrical readings and lifetime
//! counters. The temperature service is a display proxy: GX displays that
//! only render temperature sensors show its label and value.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::config::Config;
use crate::controls::{ChargerControl, NoopControl, set_current_callback, start_stop_callback};
use crate::dbus::DbusService;
use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::metrics::{DerivedState, DisplayReading, HistorySnapshot};
use crate::twc::VersionInfo;

/// Victron product id used for the charger
pub const CHARGER_PRODUCT_ID: u32 = 16;

/// Generic sensor, as opposed to battery (0) or fridge (1)
pub const TEMPERATURE_TYPE_GENERIC: u8 = 2;

pub const PROCESS_NAME: &str = "twcbus";

pub mod paths {
    pub const MGMT_PROCESS_NAME: &str = "/Mgmt/ProcessName";
    pub const MGMT_PROCESS_VERSION: &str = "/Mgmt/ProcessVersion";
    pub const MGMT_CONNECTION: &str = "/Mgmt/Connection";
    pub const DEVICE_INSTANCE: &str = "/DeviceInstance";
    pub const PRODUCT_ID: &str = "/ProductId";
    pub const PRODUCT_NAME: &str = "/ProductName";
    pub const FIRMWARE_VERSION: &str = "/FirmwareVersion";
    pub const HARDWARE_VERSION: &str = "/HardwareVersion";
    pub const SERIAL: &str = "/Serial";
    pub const CONNECTED: &str = "/Connected";
    pub const CUSTOM_NAME: &str = "/CustomName";

    pub const AC_POWER: &str = "/Ac/Power";
    pub const AC_L1_POWER: &str = "/Ac/L1/Power";
    pub const AC_L2_POWER: &str = "/Ac/L2/Power";
    pub const AC_L3_POWER: &str = "/Ac/L3/Power";
    pub const AC_ENERGY_FORWARD: &str = "/Ac/Energy/Forward";
    pub const AC_FREQUENCY: &str = "/Ac/Frequency";
    pub const AC_VOLTAGE: &str = "/Ac/Voltage";
    pub const STATUS: &str = "/Status";
    pub const CURRENT: &str = "/Current";
    pub const MAX_CURRENT: &str = "/MaxCurrent";
    pub const MODE: &str = "/Mode";
    pub const CHARGING_TIME: &str = "/ChargingTime";
    pub const PCB_TEMPERATURE: &str = "/PCB/Temperature";
    pub const MCU_TEMPERATURE: &str = "/MCU/Temperature";
    pub const HANDLE_TEMPERATURE: &str = "/Handle/Temperature";

    pub const HISTORY_CHARGING_CYCLES: &str = "/History/ChargingCycles";
    pub const HISTORY_CONNECTOR_CYCLES: &str = "/History/ConnectorCycles";
    pub const HISTORY_ENERGY_FORWARD: &str = "/History/Ac/Energy/Forward";
    pub const HISTORY_UPTIME: &str = "/History/Uptime";
    pub const HISTORY_CHARGING_TIME: &str = "/History/ChargingTime";
    pub const HISTORY_ALERTS: &str = "/History/Alerts";
    pub const HISTORY_AVG_STARTUP_TEMPERATURE: &str = "/History/AverageStartupTemperature";
    pub const HISTORY_ABORTED_CHARGING_CYCLES: &str = "/History/AbortedChargingCycles";
    pub const HISTORY_THERMAL_FOLDBACKS: &str = "/History/ThermalFoldbacks";

    pub const SET_CURRENT: &str = "/SetCurrent";
    pub const START_STOP: &str = "/StartStop";

    pub const TEMPERATURE_TYPE: &str = "/TemperatureType";
    pub const TEMPERATURE: &str = "/Temperature";

    /// Data paths created empty on the charger service
    pub const CHARGER_DATA: &[&str] = &[
        AC_POWER,
        AC_L1_POWER,
        AC_L2_POWER,
        AC_L3_POWER,
        AC_ENERGY_FORWARD,
        AC_FREQUENCY,
        AC_VOLTAGE,
        STATUS,
        CURRENT,
        MAX_CURRENT,
        MODE,
        CHARGING_TIME,
        PCB_TEMPERATURE,
        MCU_TEMPERATURE,
        HANDLE_TEMPERATURE,
        HISTORY_CHARGING_CYCLES,
        HISTORY_CONNECTOR_CYCLES,
        HISTORY_ENERGY_FORWARD,
        HISTORY_UPTIME,
        HISTORY_CHARGING_TIME,
        HISTORY_ALERTS,
        HISTORY_AVG_STARTUP_TEMPERATURE,
        HISTORY_ABORTED_CHARGING_CYCLES,
        HISTORY_THERMAL_FOLDBACKS,
    ];
}

/// Owns the charger and temperature services and maps derived values onto
/// their paths
pub struct DualServicePublisher {
    charger: DbusService,
    temperature: DbusService,
    logger: StructuredLogger,
}

impl DualServicePublisher {
    /// Create both services with the control stub wired to the writable paths
    pub async fn register(config: &Config, version: &VersionInfo, host: &str) -> Result<Self> {
        Self::register_with_control(config, version, host, Arc::new(NoopControl::new())).await
    }

    pub async fn register_with_control(
        config: &Config,
        version: &VersionInfo,
        host: &str,
        control: Arc<dyn ChargerControl>,
    ) -> Result<Self> {
        let logger = get_logger_with_context(
            LogContext::new("publisher").with_device_instance(config.effective_device_instance()),
        );
        let mut charger = DbusService::new(
            config.effective_service_name(),
            config.effective_device_instance(),
        )?;
        let mut temperature = DbusService::new(
            config.effective_temperature_service_name(),
            config.temperature_device_instance(),
        )?;

        register_mgmt(&mut charger, host).await?;
        let identity = [
            (paths::PRODUCT_ID, json!(CHARGER_PRODUCT_ID)),
            (
                paths::PRODUCT_NAME,
                json!(format!("{} - {}", config.product_name, version.serial_number)),
            ),
            (paths::FIRMWARE_VERSION, json!(version.firmware_version)),
            (paths::HARDWARE_VERSION, json!(version.part_number)),
            (paths::SERIAL, json!(version.serial_number)),
            (paths::CONNECTED, json!(1)),
            (paths::CUSTOM_NAME, json!(config.custom_name)),
        ];
        for (path, value) in identity {
            charger.add_path(path, value, false, None).await?;
        }
        for path in paths::CHARGER_DATA {
            charger.add_path(path, Value::Null, false, None).await?;
        }
        charger
            .add_path(
                paths::SET_CURRENT,
                Value::Null,
                true,
                Some(set_current_callback(Arc::clone(&control))),
            )
            .await?;
        charger
            .add_path(
                paths::START_STOP,
                Value::Null,
                true,
                Some(start_stop_callback(control)),
            )
            .await?;

        register_mgmt(&mut temperature, "local").await?;
        let proxy = [
            (paths::PRODUCT_ID, json!(0)),
            (paths::PRODUCT_NAME, json!(PROCESS_NAME)),
            (paths::FIRMWARE_VERSION, json!(0)),
            (paths::HARDWARE_VERSION, json!(0)),
            (paths::CONNECTED, json!(1)),
            (paths::CUSTOM_NAME, json!(config.name)),
            (paths::TEMPERATURE_TYPE, json!(TEMPERATURE_TYPE_GENERIC)),
            (paths::TEMPERATURE, json!(0)),
            (paths::STATUS, json!(0)),
        ];
        for (path, value) in proxy {
            temperature.add_path(path, value, false, None).await?;
        }

        logger.debug(&format!(
            "Registered {} (instance {}) and {} (instance {})",
            charger.service_name(),
            charger.device_instance(),
            temperature.service_name(),
            temperature.device_instance()
        ));

        Ok(Self {
            charger,
            temperature,
            logger,
        })
    }

    /// Claim both bus names and export the registered paths
    pub async fn start(&mut self) -> Result<()> {
        self.charger.start().await?;
        self.temperature.start().await?;
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.temperature.stop().await?;
        self.charger.stop().await
    }

    pub fn charger(&self) -> &DbusService {
        &self.charger
    }

    pub fn temperature(&self) -> &DbusService {
        &self.temperature
    }

    /// Publish one fast-cycle result: all charger fields in one update,
    /// then the display proxy
    pub async fn publish_state(
        &mut self,
        state: &DerivedState,
        display: &DisplayReading,
    ) -> Result<()> {
        let updates = [
            (paths::AC_L1_POWER, whole(state.l1_power)),
            (paths::AC_L2_POWER, whole(state.l2_power)),
            (paths::AC_L3_POWER, whole(state.l3_power)),
            (paths::AC_POWER, whole(state.total_power)),
            (paths::AC_FREQUENCY, json!(state.frequency)),
            (paths::AC_VOLTAGE, whole(state.voltage)),
            (paths::CURRENT, json!(state.current)),
            (paths::SET_CURRENT, whole(state.set_current)),
            (paths::MAX_CURRENT, whole(state.max_current)),
            (paths::AC_ENERGY_FORWARD, json!(state.energy_forward_kwh)),
            (paths::CHARGING_TIME, whole(state.charging_time_s)),
            (paths::STATUS, json!(state.status.code())),
            (paths::MODE, json!(state.mode as u8)),
            (paths::START_STOP, json!(state.start_stop as u8)),
            (paths::MCU_TEMPERATURE, json!(state.mcu_temperature)),
            (paths::PCB_TEMPERATURE, json!(state.pcb_temperature)),
            (paths::HANDLE_TEMPERATURE, json!(state.handle_temperature)),
        ];
        self.charger
            .update_paths(updates.into_iter().map(|(p, v)| (p.to_string(), v)))
            .await?;
        self.publish_display(display).await
    }

    pub async fn publish_display(&mut self, display: &DisplayReading) -> Result<()> {
        self.temperature
            .update_paths([
                (paths::CUSTOM_NAME.to_string(), json!(display.label)),
                (paths::TEMPERATURE.to_string(), json!(display.temperature)),
            ])
            .await
    }

    /// Publish lifetime counters; the average startup temperature keeps its
    /// previous value when the charger reports none
    pub async fn publish_history(&mut self, history: &HistorySnapshot) -> Result<()> {
        let mut updates = vec![
            (paths::HISTORY_CHARGING_CYCLES, json!(history.charging_cycles)),
            (paths::HISTORY_CONNECTOR_CYCLES, json!(history.connector_cycles)),
            (paths::HISTORY_ENERGY_FORWARD, json!(history.energy_wh)),
            (paths::HISTORY_UPTIME, json!(history.uptime_s)),
            (paths::HISTORY_CHARGING_TIME, json!(history.charging_time_s)),
            (paths::HISTORY_ALERTS, json!(history.alerts)),
            (
                paths::HISTORY_ABORTED_CHARGING_CYCLES,
                json!(history.aborted_charging_cycles),
            ),
            (paths::HISTORY_THERMAL_FOLDBACKS, json!(history.thermal_foldbacks)),
        ];
        if let Some(avg) = history.average_startup_temperature {
            updates.push((paths::HISTORY_AVG_STARTUP_TEMPERATURE, json!(avg)));
        }
        self.charger
            .update_paths(updates.into_iter().map(|(p, v)| (p.to_string(), v)))
            .await
    }

    /// Charger unreachable: flag the charger disconnected and put the error
    /// reading on the display proxy
    pub async fn mark_disconnected(&mut self, name: &str) -> Result<()> {
        self.logger.warn("Charger unreachable, marking disconnected");
        self.charger.update_path(paths::CONNECTED, json!(0)).await?;
        self.publish_display(&DisplayReading::error(name)).await
    }

    pub async fn mark_connected(&mut self) -> Result<()> {
        self.logger.info("Charger reachable again");
        self.charger.update_path(paths::CONNECTED, json!(1)).await
    }
}

async fn register_mgmt(service: &mut DbusService, connection: &str) -> Result<()> {
    let instance = service.device_instance();
    let mgmt = [
        (paths::MGMT_PROCESS_NAME, json!(PROCESS_NAME)),
        (paths::MGMT_PROCESS_VERSION, json!(env!("APP_VERSION"))),
        (paths::MGMT_CONNECTION, json!(connection)),
        (paths::DEVICE_INSTANCE, json!(instance)),
    ];
    for (path, value) in mgmt {
        service.add_path(path, value, false, None).await?;
    }
    Ok(())
}

/// Whole-number readings go on the bus as integers
fn whole(value: f64) -> Value {
    if value.is_finite() {
        json!(value as i64)
    } else {
        Value::Null
    }
}
