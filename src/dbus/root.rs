use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{OwnedValue, Value};

use super::items::BusItem;
use super::shared::{DbusSharedState, lock_shared};
use super::util::format_text_value;

fn text_owned_value(val: &serde_json::Value) -> OwnedValue {
    let text = format_text_value(val);
    OwnedValue::try_from(Value::from(text.as_str())).unwrap_or_else(|_| OwnedValue::from(0i64))
}

/// Values (or texts) of every registered path below `prefix`, keyed by the
/// path relative to it
fn collect_subtree_map(
    shared: &Mutex<DbusSharedState>,
    prefix: &str,
    as_text: bool,
) -> HashMap<String, OwnedValue> {
    let shared = lock_shared(shared);
    let mut px = prefix.to_string();
    if !px.ends_with('/') {
        px.push('/');
    }
    let mut result: HashMap<String, OwnedValue> = HashMap::new();
    for (path, val) in shared.paths.iter() {
        if let Some(suffix) = path.strip_prefix(&px) {
            let ov = if as_text {
                text_owned_value(val)
            } else {
                BusItem::serde_to_owned_value(val)
            };
            result.insert(suffix.to_string(), ov);
        }
    }
    result
}

/// Root object of a service; answers for the whole tree
pub struct RootBus {
    pub(crate) shared: Arc<Mutex<DbusSharedState>>,
}

impl RootBus {
    pub fn new(shared: Arc<Mutex<DbusSharedState>>) -> Self {
        Self { shared }
    }

    pub(crate) fn items(&self) -> HashMap<String, HashMap<String, OwnedValue>> {
        let shared = lock_shared(&self.shared);
        let mut out: HashMap<String, HashMap<String, OwnedValue>> = HashMap::new();
        for (path, val) in shared.paths.iter() {
            let mut entry: HashMap<String, OwnedValue> = HashMap::new();
            entry.insert("Value".to_string(), BusItem::serde_to_owned_value(val));
            entry.insert("Text".to_string(), text_owned_value(val));
            out.insert(path.clone(), entry);
        }
        out
    }
}

#[zbus::interface(name = "com.victronenergy.BusItem")]
impl RootBus {
    #[zbus(name = "GetValue")]
    async fn get_value(&self) -> OwnedValue {
        OwnedValue::from(collect_subtree_map(&self.shared, "/", false))
    }

    #[zbus(name = "GetText")]
    async fn get_text(&self) -> OwnedValue {
        OwnedValue::from(collect_subtree_map(&self.shared, "/", true))
    }

    #[zbus(name = "GetItems")]
    async fn get_items(&self) -> HashMap<String, HashMap<String, OwnedValue>> {
        self.items()
    }

    #[zbus(signal)]
    pub async fn items_changed(
        ctxt: &SignalEmitter<'_>,
        changes: HashMap<&str, HashMap<&str, OwnedValue>>,
    ) -> zbus::Result<()>;
}

/// Intermediate node such as `/Ac` or `/History/Ac`
pub struct TreeNode {
    pub(crate) path: String,
    pub(crate) shared: Arc<Mutex<DbusSharedState>>,
}

impl TreeNode {
    pub fn new(path: String, shared: Arc<Mutex<DbusSharedState>>) -> Self {
        Self { path, shared }
    }
}

#[zbus::interface(name = "com.victronenergy.BusItem")]
impl TreeNode {
    #[zbus(name = "GetValue")]
    async fn get_value(&self) -> OwnedValue {
        OwnedValue::from(collect_subtree_map(&self.shared, &self.path, false))
    }

    #[zbus(name = "GetText")]
    async fn get_text(&self) -> OwnedValue {
        OwnedValue::from(collect_subtree_map(&self.shared, &self.path, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::OwnedObjectPath;

    fn populated() -> Arc<Mutex<DbusSharedState>> {
        let root = OwnedObjectPath::try_from("/").unwrap();
        let shared = Arc::new(Mutex::new(DbusSharedState::new(root)));
        {
            let mut s = lock_shared(&shared);
            s.paths
                .insert("/Ac/Power".to_string(), serde_json::json!(6900));
            s.paths
                .insert("/Ac/L1/Power".to_string(), serde_json::json!(2300));
            s.paths
                .insert("/Ac/Frequency".to_string(), serde_json::json!(50.0));
            s.paths.insert("/Status".to_string(), serde_json::Value::Null);
        }
        shared
    }

    #[test]
    fn subtree_is_keyed_relative_to_node() {
        let shared = populated();
        let map = collect_subtree_map(&shared, "/Ac", false);
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("Power"));
        assert!(map.contains_key("L1/Power"));
        assert!(!map.contains_key("Status"));
    }

    #[test]
    fn subtree_text_uses_display_format() {
        let shared = populated();
        let map = collect_subtree_map(&shared, "/", true);
        let status = <&str as TryFrom<&OwnedValue>>::try_from(&map["Status"]).unwrap();
        assert_eq!(status, "---");
        let freq = <&str as TryFrom<&OwnedValue>>::try_from(&map["Ac/Frequency"]).unwrap();
        assert_eq!(freq, "50.00");
    }

    #[test]
    fn get_items_lists_every_path() {
        let root = RootBus::new(populated());
        let items = root.items();
        assert_eq!(items.len(), 4);
        let entry = items.get("/Ac/Power").unwrap();
        assert!(entry.contains_key("Value"));
        assert!(entry.contains_key("Text"));
    }
}
