//! Derivation of published metrics from raw charger readings
//!
//! Everything here is pure: raw vendor snapshots in, normalized values
//! out. Rounding follows the charger's own reporting, which rounds each
//! phase before summing and rounds halves to even.

use serde::Serialize;

use crate::config::DisplayMode;
use crate::twc::{LifetimeRaw, VitalsRaw};

/// Set/max current published while no control loop exists
pub const STATIC_SET_CURRENT: f64 = 16.0;

/// Vehicle current above which a connected car counts as charging
pub const CHARGING_CURRENT_THRESHOLD_A: f64 = 1.0;

/// Temperature shown on the display proxy while the charger is unreachable
pub const ERROR_TEMPERATURE: f64 = -1.0;

/// Victron EV charger status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ChargerStatus {
    Disconnected = 0,
    Connected = 1,
    Charging = 2,
}

impl ChargerStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Evaluate the status from a single vitals snapshot, without hysteresis
    pub fn from_vitals(vehicle_connected: bool, vehicle_current_a: f64) -> Self {
        if !vehicle_connected {
            Self::Disconnected
        } else if vehicle_current_a > CHARGING_CURRENT_THRESHOLD_A {
            Self::Charging
        } else {
            Self::Connected
        }
    }
}

/// Charging mode; only manual exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ChargingMode {
    Manual = 0,
}

/// Start/stop state; the charger is always enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum StartStopState {
    Stopped = 0,
    AlwaysOn = 1,
}

/// Values published on the charger service after each vitals fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedState {
    pub l1_power: f64,
    pub l2_power: f64,
    pub l3_power: f64,
    pub total_power: f64,
    pub frequency: f64,
    pub voltage: f64,
    pub current: f64,
    pub set_current: f64,
    pub max_current: f64,
    pub energy_forward_kwh: f64,
    pub charging_time_s: f64,
    pub status: ChargerStatus,
    pub mode: ChargingMode,
    pub start_stop: StartStopState,
    pub pcb_temperature: f64,
    pub mcu_temperature: f64,
    pub handle_temperature: f64,
}

/// Cumulative counters published under `/History`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySnapshot {
    pub charging_cycles: i64,
    pub connector_cycles: i64,
    pub energy_wh: i64,
    pub uptime_s: i64,
    pub charging_time_s: i64,
    pub alerts: i64,
    /// Only set when the charger reports a non-zero average
    pub average_startup_temperature: Option<i64>,
    pub aborted_charging_cycles: i64,
    pub thermal_foldbacks: i64,
}

impl HistorySnapshot {
    pub fn from_raw(raw: &LifetimeRaw) -> Self {
        Self {
            charging_cycles: truncate(raw.charge_starts),
            connector_cycles: truncate(raw.connector_cycles),
            energy_wh: truncate(raw.energy_wh),
            uptime_s: truncate(raw.uptime_s),
            charging_time_s: truncate(raw.charging_time_s),
            alerts: truncate(raw.alert_count),
            average_startup_temperature: raw
                .avg_startup_temp
                .filter(|t| t.is_finite() && *t != 0.0)
                .map(truncate),
            aborted_charging_cycles: truncate(raw.contactor_cycles_loaded),
            thermal_foldbacks: truncate(raw.thermal_foldbacks),
        }
    }
}

/// Label and value shown by the temperature display proxy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayReading {
    pub label: String,
    pub temperature: f64,
}

impl DisplayReading {
    pub fn from_state(mode: DisplayMode, name: &str, state: &DerivedState) -> Self {
        match mode {
            DisplayMode::HandleTemperature => Self {
                label: format!("{} Handle", name),
                temperature: round_to(state.handle_temperature, 1),
            },
            DisplayMode::ChargerStatus => match state.status {
                ChargerStatus::Charging => Self {
                    label: format!("{} Charging [kW]", name),
                    temperature: round_to(state.total_power / 1000.0, 1),
                },
                ChargerStatus::Connected => Self {
                    label: format!("{} Car Connected [A]", name),
                    temperature: state.set_current,
                },
                ChargerStatus::Disconnected => Self {
                    label: format!("{} Idle [A]", name),
                    temperature: state.set_current,
                },
            },
        }
    }

    /// Reading shown while the charger cannot be reached
    pub fn error(name: &str) -> Self {
        Self {
            label: format!("{} Error", name),
            temperature: ERROR_TEMPERATURE,
        }
    }
}

/// Derive the charger state from vitals and the latest lifetime counters
pub fn derive(vitals: &VitalsRaw, history: &HistorySnapshot) -> DerivedState {
    let l1_power = round_to(vitals.current_a_a * vitals.voltage_a_v, 0);
    let l2_power = round_to(vitals.current_b_a * vitals.voltage_b_v, 0);
    let l3_power = round_to(vitals.current_c_a * vitals.voltage_c_v, 0);

    DerivedState {
        l1_power,
        l2_power,
        l3_power,
        total_power: l1_power + l2_power + l3_power,
        frequency: round_to(vitals.grid_hz, 1),
        voltage: round_to(vitals.grid_v, 0),
        current: round_to(vitals.vehicle_current_a, 1),
        set_current: STATIC_SET_CURRENT,
        max_current: STATIC_SET_CURRENT,
        energy_forward_kwh: round_to(history.energy_wh as f64 / 1000.0, 3),
        charging_time_s: vitals.session_s,
        status: ChargerStatus::from_vitals(vitals.vehicle_connected, vitals.vehicle_current_a),
        mode: ChargingMode::Manual,
        start_stop: StartStopState::AlwaysOn,
        pcb_temperature: vitals.pcba_temp_c,
        mcu_temperature: vitals.mcu_temp_c,
        handle_temperature: vitals.handle_temp_c,
    }
}

/// Round to `digits` decimals, halves to even
pub fn round_to(value: f64, digits: i32) -> f64 {
    if digits == 0 {
        return value.round_ties_even();
    }
    let scale = 10f64.powi(digits);
    (value * scale).round_ties_even() / scale
}

fn truncate(value: f64) -> i64 {
    if value.is_finite() { value as i64 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals(connected: bool, vehicle_current: f64) -> VitalsRaw {
        VitalsRaw {
            contactor_closed: connected,
            vehicle_connected: connected,
            session_s: 120.0,
            grid_v: 230.4,
            grid_hz: 49.98,
            vehicle_current_a: vehicle_current,
            current_a_a: 10.0,
            current_b_a: 10.0,
            current_c_a: 10.0,
            current_n_a: None,
            voltage_a_v: 230.0,
            voltage_b_v: 230.0,
            voltage_c_v: 230.0,
            pcba_temp_c: 31.2,
            handle_temp_c: 24.46,
            mcu_temp_c: 38.0,
            uptime_s: Some(1000.0),
            session_energy_wh: Some(777.0),
            evse_state: None,
            current_alerts: Vec::new(),
        }
    }

    fn history(energy_wh: i64) -> HistorySnapshot {
        HistorySnapshot {
            charging_cycles: 1,
            connector_cycles: 1,
            energy_wh,
            uptime_s: 1,
            charging_time_s: 1,
            alerts: 0,
            average_startup_temperature: None,
            aborted_charging_cycles: 0,
            thermal_foldbacks: 0,
        }
    }

    #[test]
    fn status_disconnected_ignores_current() {
        for current in [0.0, 1.0, 1.5, 32.0] {
            assert_eq!(
                ChargerStatus::from_vitals(false, current),
                ChargerStatus::Disconnected
            );
        }
    }

    #[test]
    fn status_threshold_is_strictly_greater_than_one() {
        assert_eq!(ChargerStatus::from_vitals(true, 0.0), ChargerStatus::Connected);
        assert_eq!(ChargerStatus::from_vitals(true, 1.0), ChargerStatus::Connected);
        assert_eq!(ChargerStatus::from_vitals(true, 1.01), ChargerStatus::Charging);
        assert_eq!(ChargerStatus::Charging.code(), 2);
    }

    #[test]
    fn total_power_sums_rounded_phases() {
        let mut v = vitals(true, 10.0);
        // Each phase is 100.4 W: rounded phases sum to 300, true sum is 301.2
        v.current_a_a = 0.4;
        v.current_b_a = 0.4;
        v.current_c_a = 0.4;
        v.voltage_a_v = 251.0;
        v.voltage_b_v = 251.0;
        v.voltage_c_v = 251.0;
        let d = derive(&v, &history(0));
        assert_eq!(d.l1_power, 100.0);
        assert_eq!(d.total_power, 300.0);
        assert_ne!(d.total_power, round_to(0.4 * 251.0 * 3.0, 0));
    }

    #[test]
    fn energy_forward_comes_from_lifetime_counter() {
        let d = derive(&vitals(true, 10.0), &history(1_234_567));
        assert_eq!(d.energy_forward_kwh, 1234.567);
    }

    #[test]
    fn rounding_matches_display_convention() {
        let d = derive(&vitals(true, 10.04), &history(0));
        assert_eq!(d.frequency, 50.0);
        assert_eq!(d.voltage, 230.0);
        assert_eq!(d.current, 10.0);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
    }

    #[test]
    fn constants_are_fixed() {
        let d = derive(&vitals(false, 0.0), &history(0));
        assert_eq!(d.mode as u8, 0);
        assert_eq!(d.start_stop as u8, 1);
        assert_eq!(d.set_current, 16.0);
        assert_eq!(d.max_current, 16.0);
    }

    #[test]
    fn history_suppresses_zero_and_missing_startup_temperature() {
        let mut raw = LifetimeRaw {
            contactor_cycles: 10.0,
            contactor_cycles_loaded: 2.0,
            alert_count: 4.0,
            thermal_foldbacks: 1.0,
            avg_startup_temp: None,
            charge_starts: 9.0,
            energy_wh: 5000.9,
            connector_cycles: 8.0,
            uptime_s: 100.0,
            charging_time_s: 50.0,
        };
        let h = HistorySnapshot::from_raw(&raw);
        assert_eq!(h.average_startup_temperature, None);
        assert_eq!(h.energy_wh, 5000);
        assert_eq!(h.aborted_charging_cycles, 2);

        raw.avg_startup_temp = Some(0.0);
        assert_eq!(HistorySnapshot::from_raw(&raw).average_startup_temperature, None);

        raw.avg_startup_temp = Some(21.7);
        assert_eq!(
            HistorySnapshot::from_raw(&raw).average_startup_temperature,
            Some(21)
        );
    }

    #[test]
    fn display_reading_modes() {
        let d = derive(&vitals(true, 10.0), &history(0));
        let handle = DisplayReading::from_state(DisplayMode::HandleTemperature, "TWC3", &d);
        assert_eq!(handle.label, "TWC3 Handle");
        assert_eq!(handle.temperature, 24.5);

        let status = DisplayReading::from_state(DisplayMode::ChargerStatus, "TWC3", &d);
        assert_eq!(status.label, "TWC3 Charging [kW]");
        assert_eq!(status.temperature, 6.9);

        let idle = derive(&vitals(false, 0.0), &history(0));
        let idle = DisplayReading::from_state(DisplayMode::ChargerStatus, "TWC3", &idle);
        assert_eq!(idle.label, "TWC3 Idle [A]");
        assert_eq!(idle.temperature, 16.0);

        let err = DisplayReading::error("TWC3");
        assert_eq!(err.label, "TWC3 Error");
        assert_eq!(err.temperature, -1.0);
    }
}
