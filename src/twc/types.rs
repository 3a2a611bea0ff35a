use serde::{Deserialize, Serialize};

/// `/api/1/version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub serial_number: String,
    pub firmware_version: String,
    pub part_number: String,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub web_service: Option<String>,
}

/// `/api/1/lifetime`, cumulative counters since manufacture.
///
/// The firmware reports `avg_startup_temp` as a bare `nan` until the unit
/// has a valid average; it arrives here as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeRaw {
    pub contactor_cycles: f64,
    pub contactor_cycles_loaded: f64,
    pub alert_count: f64,
    pub thermal_foldbacks: f64,
    pub avg_startup_temp: Option<f64>,
    pub charge_starts: f64,
    pub energy_wh: f64,
    pub connector_cycles: f64,
    pub uptime_s: f64,
    pub charging_time_s: f64,
}

/// `/api/1/vitals`, live electrical and thermal readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsRaw {
    #[serde(default)]
    pub contactor_closed: bool,
    pub vehicle_connected: bool,
    pub session_s: f64,
    pub grid_v: f64,
    pub grid_hz: f64,
    pub vehicle_current_a: f64,
    #[serde(rename = "currentA_a")]
    pub current_a_a: f64,
    #[serde(rename = "currentB_a")]
    pub current_b_a: f64,
    #[serde(rename = "currentC_a")]
    pub current_c_a: f64,
    #[serde(rename = "currentN_a", default)]
    pub current_n_a: Option<f64>,
    #[serde(rename = "voltageA_v")]
    pub voltage_a_v: f64,
    #[serde(rename = "voltageB_v")]
    pub voltage_b_v: f64,
    #[serde(rename = "voltageC_v")]
    pub voltage_c_v: f64,
    pub pcba_temp_c: f64,
    pub handle_temp_c: f64,
    pub mcu_temp_c: f64,
    #[serde(default)]
    pub uptime_s: Option<f64>,
    /// Present on the wire but not published; energy comes from lifetime
    #[serde(default)]
    pub session_energy_wh: Option<f64>,
    #[serde(default)]
    pub evse_state: Option<i64>,
    #[serde(default)]
    pub current_alerts: Vec<serde_json::Value>,
}
