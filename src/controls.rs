//! Charging control capability
//!
//! The Wall Connector's local API is read-only, so `/SetCurrent` and
//! `/StartStop` are published as writable paths whose writes reach a
//! [`ChargerControl`] implementation. [`NoopControl`] accepts every value
//! and only logs it; no hardware action is taken.

use std::sync::Arc;

use crate::dbus::ChangeCallback;
use crate::logging::{StructuredLogger, get_logger};

/// Actions a bus client may request on the charger
pub trait ChargerControl: Send + Sync {
    /// Requested charging current in amps; `false` rejects the write
    fn set_current(&self, value: &serde_json::Value) -> bool;

    /// Requested start (1) or stop (0); `false` rejects the write
    fn start_stop(&self, value: &serde_json::Value) -> bool;
}

/// Placeholder control that accepts and logs every request
pub struct NoopControl {
    logger: StructuredLogger,
}

impl NoopControl {
    pub fn new() -> Self {
        Self {
            logger: get_logger("controls"),
        }
    }

    fn accept(&self, path: &str, value: &serde_json::Value) -> bool {
        self.logger
            .info(&format!("Unimplemented {} {}", path, value));
        true
    }
}

impl Default for NoopControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ChargerControl for NoopControl {
    fn set_current(&self, value: &serde_json::Value) -> bool {
        self.accept("/SetCurrent", value)
    }

    fn start_stop(&self, value: &serde_json::Value) -> bool {
        self.accept("/StartStop", value)
    }
}

/// Callback for the `/SetCurrent` path
pub fn set_current_callback(control: Arc<dyn ChargerControl>) -> ChangeCallback {
    Arc::new(move |_path: &str, value: &serde_json::Value| control.set_current(value))
}

/// Callback for the `/StartStop` path
pub fn start_stop_callback(control: Arc<dyn ChargerControl>) -> ChangeCallback {
    Arc::new(move |_path: &str, value: &serde_json::Value| control.start_stop(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(&'static str, serde_json::Value)>>,
    }

    impl ChargerControl for Recording {
        fn set_current(&self, value: &serde_json::Value) -> bool {
            self.seen.lock().unwrap().push(("current", value.clone()));
            true
        }

        fn start_stop(&self, value: &serde_json::Value) -> bool {
            self.seen.lock().unwrap().push(("start_stop", value.clone()));
            value.as_i64().is_some_and(|v| v == 0 || v == 1)
        }
    }

    #[test]
    fn noop_control_accepts_anything() {
        let control = NoopControl::new();
        assert!(control.set_current(&serde_json::json!(32)));
        assert!(control.set_current(&serde_json::json!("garbage")));
        assert!(control.start_stop(&serde_json::json!(0)));
    }

    #[test]
    fn callbacks_route_to_the_right_action() {
        let rec = Arc::new(Recording::default());
        let set_cb = set_current_callback(rec.clone());
        let ss_cb = start_stop_callback(rec.clone());

        assert!(set_cb("/SetCurrent", &serde_json::json!(10)));
        assert!(ss_cb("/StartStop", &serde_json::json!(1)));
        assert!(!ss_cb("/StartStop", &serde_json::json!(7)));

        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], ("current", serde_json::json!(10)));
        assert_eq!(seen[1].0, "start_stop");
    }
}
