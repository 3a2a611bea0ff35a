use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

use super::shared::{DbusSharedState, lock_shared};
use super::util::format_text_value;

/// VeDbus-style BusItem implementing com.victronenergy.BusItem
pub struct BusItem {
    pub(crate) path: String,
    pub(crate) shared: Arc<Mutex<DbusSharedState>>,
}

impl BusItem {
    pub fn new(path: String, shared: Arc<Mutex<DbusSharedState>>) -> Self {
        Self { path, shared }
    }

    /// `{"Value": .., "Text": ..}` as carried by change signals
    pub(crate) fn change_entry(value: &serde_json::Value) -> HashMap<&'static str, OwnedValue> {
        let mut entry = HashMap::new();
        entry.insert("Value", Self::serde_to_owned_value(value));
        let text = format_text_value(value);
        if let Ok(text_ov) = OwnedValue::try_from(Value::from(text.as_str())) {
            entry.insert("Text", text_ov);
        }
        entry
    }

    /// Null maps to the VeDbus invalid value, an empty int32 array
    pub(crate) fn serde_to_owned_value(v: &serde_json::Value) -> OwnedValue {
        match v {
            serde_json::Value::Bool(b) => OwnedValue::from(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    OwnedValue::from(i)
                } else if let Some(u) = n.as_u64() {
                    OwnedValue::from(u)
                } else {
                    OwnedValue::from(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => OwnedValue::try_from(Value::from(s.as_str()))
                .unwrap_or_else(|_| Self::invalid_value()),
            _ => Self::invalid_value(),
        }
    }

    fn invalid_value() -> OwnedValue {
        OwnedValue::try_from(Value::from(Vec::<i32>::new()))
            .unwrap_or_else(|_| OwnedValue::from(0i64))
    }

    pub(crate) fn owned_value_to_serde(v: &OwnedValue) -> serde_json::Value {
        if let Value::Array(arr) = &**v
            && arr.is_empty()
        {
            return serde_json::Value::Null;
        }
        if let Ok(b) = <bool as TryFrom<&OwnedValue>>::try_from(v) {
            return serde_json::json!(b);
        }
        if let Ok(i) = <i64 as TryFrom<&OwnedValue>>::try_from(v) {
            return serde_json::json!(i);
        }
        if let Ok(i) = <i32 as TryFrom<&OwnedValue>>::try_from(v) {
            return serde_json::json!(i);
        }
        if let Ok(u) = <u64 as TryFrom<&OwnedValue>>::try_from(v) {
            return serde_json::json!(u);
        }
        if let Ok(u) = <u32 as TryFrom<&OwnedValue>>::try_from(v) {
            return serde_json::json!(u);
        }
        if let Ok(u) = <u8 as TryFrom<&OwnedValue>>::try_from(v) {
            return serde_json::json!(u);
        }
        if let Ok(f) = <f64 as TryFrom<&OwnedValue>>::try_from(v) {
            return serde_json::json!(f);
        }
        if let Ok(s) = <&str as TryFrom<&OwnedValue>>::try_from(v) {
            return serde_json::json!(s.to_string());
        }
        serde_json::json!(v.to_string())
    }

    fn current_value(&self) -> serde_json::Value {
        lock_shared(&self.shared)
            .paths
            .get(&self.path)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

#[zbus::interface(name = "com.victronenergy.BusItem")]
impl BusItem {
    #[zbus(name = "GetValue")]
    async fn get_value(&self) -> OwnedValue {
        Self::serde_to_owned_value(&self.current_value())
    }

    /// Returns 0 when accepted, 1 when the path is read-only or the
    /// change callback refused the value.
    #[zbus(name = "SetValue")]
    async fn set_value(&self, value: OwnedValue) -> i32 {
        let written = Self::owned_value_to_serde(&value);
        let callback = {
            let shared = lock_shared(&self.shared);
            if !shared.writable.contains(&self.path) {
                return 1;
            }
            shared.callbacks.get(&self.path).cloned()
        };

        // Callbacks run unlocked and may read the registry
        if let Some(cb) = callback
            && !cb(&self.path, &written)
        {
            return 1;
        }

        let (conn_opt, root_path) = {
            let mut shared = lock_shared(&self.shared);
            shared.paths.insert(self.path.clone(), written.clone());
            (shared.connection.clone(), shared.root_path.clone())
        };

        if let Some(conn) = conn_opt {
            if let Ok(obj_path) = OwnedObjectPath::try_from(self.path.as_str())
                && let Ok(item_ctx) = SignalEmitter::new(&conn, obj_path)
            {
                let _ = Self::properties_changed(&item_ctx, Self::change_entry(&written)).await;
            }
            if let Ok(root_ctx) = SignalEmitter::new(&conn, root_path) {
                let mut outer: HashMap<&str, HashMap<&str, OwnedValue>> = HashMap::new();
                outer.insert(self.path.as_str(), Self::change_entry(&written));
                let _ = super::root::RootBus::items_changed(&root_ctx, outer).await;
            }
        }

        0
    }

    #[zbus(name = "GetText")]
    async fn get_text(&self) -> String {
        format_text_value(&self.current_value())
    }

    #[zbus(signal)]
    pub async fn properties_changed(
        ctxt: &SignalEmitter<'_>,
        changes: HashMap<&str, OwnedValue>,
    ) -> zbus::Result<()>;
}
