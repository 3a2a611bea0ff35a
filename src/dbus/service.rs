use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};
use zbus::{Connection, names::WellKnownName};

use crate::error::{BridgeError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};

use super::connect_bus;
use super::items::BusItem;
use super::root::{RootBus, TreeNode};
use super::shared::{ChangeCallback, DbusSharedState, lock_shared};

/// One published device: a well-known bus name plus its path registry.
///
/// Paths can be added and updated before `start()`; the registry is the
/// source of truth and the bus objects are created from it once connected.
pub struct DbusService {
    logger: StructuredLogger,
    service_name: String,
    device_instance: u32,
    connection: Option<Connection>,
    pub(crate) shared: Arc<Mutex<DbusSharedState>>,
    registered_paths: HashSet<String>,
    root_path: OwnedObjectPath,
}

impl DbusService {
    pub fn new(service_name: impl Into<String>, device_instance: u32) -> Result<Self> {
        let service_name = service_name.into();
        WellKnownName::try_from(service_name.as_str()).map_err(|e| {
            BridgeError::dbus(format!("Invalid service name '{}': {}", service_name, e))
        })?;
        let root_path = OwnedObjectPath::try_from("/")
            .map_err(|e| BridgeError::dbus(format!("Invalid object path: {}", e)))?;
        let logger = get_logger_with_context(
            LogContext::new("dbus")
                .with_device_instance(device_instance)
                .with_field("service", service_name.clone()),
        );
        Ok(Self {
            logger,
            service_name,
            device_instance,
            connection: None,
            shared: Arc::new(Mutex::new(DbusSharedState::new(root_path.clone()))),
            registered_paths: HashSet::new(),
            root_path,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn device_instance(&self) -> u32 {
        self.device_instance
    }

    pub fn is_started(&self) -> bool {
        self.connection.is_some()
    }

    /// Register `path` with its initial value. Re-adding a path replaces
    /// its value, writability and callback.
    pub async fn add_path(
        &mut self,
        path: &str,
        initial_value: serde_json::Value,
        writable: bool,
        on_change: Option<ChangeCallback>,
    ) -> Result<()> {
        object_path(path)?;
        {
            let mut shared = lock_shared(&self.shared);
            shared.paths.insert(path.to_string(), initial_value);
            if writable {
                shared.writable.insert(path.to_string());
            } else {
                shared.writable.remove(path);
            }
            match on_change {
                Some(cb) => {
                    shared.callbacks.insert(path.to_string(), cb);
                }
                None => {
                    shared.callbacks.remove(path);
                }
            }
        }
        if self.connection.is_some() {
            self.export_path(path).await?;
        }
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<serde_json::Value> {
        lock_shared(&self.shared).paths.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        lock_shared(&self.shared).paths.contains_key(path)
    }

    pub fn is_writable(&self, path: &str) -> bool {
        lock_shared(&self.shared).writable.contains(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut out: Vec<String> = lock_shared(&self.shared).paths.keys().cloned().collect();
        out.sort();
        out
    }

    pub async fn update_path(&mut self, path: &str, value: serde_json::Value) -> Result<()> {
        self.update_paths([(path.to_string(), value)]).await
    }

    /// Apply several updates as one change: every path must already be
    /// registered, values are stored under a single lock and one
    /// `ItemsChanged` signal carries all paths whose value changed.
    pub async fn update_paths(
        &mut self,
        updates: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) -> Result<()> {
        let updates: Vec<(String, serde_json::Value)> = updates.into_iter().collect();
        let changed: Vec<(String, serde_json::Value)> = {
            let mut shared = lock_shared(&self.shared);
            if let Some((missing, _)) = updates.iter().find(|(p, _)| !shared.paths.contains_key(p))
            {
                return Err(BridgeError::validation(
                    missing.clone(),
                    format!("path not registered on {}", self.service_name),
                ));
            }
            let mut changed = Vec::new();
            for (path, value) in updates {
                if shared.paths.get(&path) == Some(&value) {
                    continue;
                }
                shared.paths.insert(path.clone(), value.clone());
                changed.push((path, value));
            }
            changed
        };

        if changed.is_empty() {
            return Ok(());
        }
        self.logger
            .trace(&format!("Updated {} path(s)", changed.len()));
        self.emit_changes(&changed).await
    }

    async fn emit_changes(&self, changed: &[(String, serde_json::Value)]) -> Result<()> {
        let Some(conn) = &self.connection else {
            return Ok(());
        };
        for (path, value) in changed {
            let item_ctx = SignalEmitter::new(conn, object_path(path)?)
                .map_err(|e| BridgeError::dbus(format!("SignalEmitter new failed: {}", e)))?;
            if let Err(e) = BusItem::properties_changed(&item_ctx, BusItem::change_entry(value)).await
            {
                self.logger
                    .debug(&format!("PropertiesChanged for {} failed: {}", path, e));
            }
        }

        let root_ctx = SignalEmitter::new(conn, self.root_path.clone())
            .map_err(|e| BridgeError::dbus(format!("Root SignalEmitter failed: {}", e)))?;
        let mut outer: HashMap<&str, HashMap<&str, OwnedValue>> = HashMap::new();
        for (path, value) in changed {
            outer.insert(path.as_str(), BusItem::change_entry(value));
        }
        RootBus::items_changed(&root_ctx, outer)
            .await
            .map_err(|e| BridgeError::dbus(format!("ItemsChanged failed: {}", e)))
    }

    /// Connect, claim the service name and export every registered path
    pub async fn start(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = connect_bus().await?;
        self.request_name(&connection).await?;

        connection
            .object_server()
            .at(&self.root_path, RootBus::new(Arc::clone(&self.shared)))
            .await
            .map_err(|e| BridgeError::dbus(format!("Register root BusItem failed: {}", e)))?;

        lock_shared(&self.shared).connection = Some(connection.clone());
        self.connection = Some(connection);

        for path in self.paths() {
            self.export_path(&path).await?;
        }
        self.logger.info(&format!(
            "D-Bus service started: {} (instance {})",
            self.service_name, self.device_instance
        ));
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(conn) = self.connection.take() {
            self.logger.info("Stopping D-Bus service");
            lock_shared(&self.shared).connection = None;
            let name = WellKnownName::try_from(self.service_name.as_str())
                .map_err(|e| BridgeError::dbus(format!("Invalid service name: {}", e)))?;
            if let Err(e) = conn.release_name(name).await {
                self.logger.warn(&format!("ReleaseName failed: {}", e));
            }
            self.registered_paths.clear();
        }
        Ok(())
    }

    /// Export `path` and any missing intermediate nodes
    async fn export_path(&mut self, path: &str) -> Result<()> {
        let Some(conn) = self.connection.clone() else {
            return Ok(());
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for i in 1..=segments.len() {
            let subpath = format!("/{}", segments[..i].join("/"));
            if self.registered_paths.contains(&subpath) {
                continue;
            }
            let obj_path = object_path(&subpath)?;
            let registered = if i == segments.len() {
                conn.object_server()
                    .at(&obj_path, BusItem::new(subpath.clone(), Arc::clone(&self.shared)))
                    .await
            } else {
                conn.object_server()
                    .at(&obj_path, TreeNode::new(subpath.clone(), Arc::clone(&self.shared)))
                    .await
            };
            registered.map_err(|e| {
                BridgeError::dbus(format!("Register object failed for {}: {}", subpath, e))
            })?;
            self.registered_paths.insert(subpath);
        }
        Ok(())
    }

    async fn request_name(&self, connection: &Connection) -> Result<()> {
        use zbus::fdo::{DBusProxy, RequestNameFlags, RequestNameReply};
        let proxy = DBusProxy::new(connection)
            .await
            .map_err(|e| BridgeError::dbus(format!("DBusProxy creation failed: {}", e)))?;
        let name = WellKnownName::try_from(self.service_name.as_str())
            .map_err(|e| BridgeError::dbus(format!("Invalid service name: {}", e)))?;
        let reply = proxy
            .request_name(
                name,
                RequestNameFlags::ReplaceExisting | RequestNameFlags::DoNotQueue,
            )
            .await
            .map_err(|e| BridgeError::dbus(format!("RequestName failed: {}", e)))?;
        match reply {
            RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner => Ok(()),
            other => Err(BridgeError::dbus(format!(
                "Could not own {}: {:?}",
                self.service_name, other
            ))),
        }
    }
}

fn object_path(path: &str) -> Result<OwnedObjectPath> {
    OwnedObjectPath::try_from(path)
        .map_err(|e| BridgeError::dbus(format!("Invalid object path '{}': {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn add_and_update_paths_without_bus() {
        let mut svc = DbusService::new("com.victronenergy.evcharger.twc3", 42).unwrap();
        svc.add_path("/Ac/Power", serde_json::Value::Null, false, None)
            .await
            .unwrap();
        svc.add_path("/Status", serde_json::Value::Null, false, None)
            .await
            .unwrap();
        assert_eq!(svc.get("/Ac/Power"), Some(serde_json::Value::Null));

        svc.update_paths([
            ("/Ac/Power".to_string(), serde_json::json!(6900.0)),
            ("/Status".to_string(), serde_json::json!(2)),
        ])
        .await
        .unwrap();
        assert_eq!(svc.get("/Ac/Power"), Some(serde_json::json!(6900.0)));
        assert_eq!(svc.get("/Status"), Some(serde_json::json!(2)));
        assert!(!svc.is_started());
    }

    #[tokio::test]
    async fn update_of_unknown_path_changes_nothing() {
        let mut svc = DbusService::new("com.victronenergy.evcharger.twc3", 42).unwrap();
        svc.add_path("/Status", serde_json::json!(0), false, None)
            .await
            .unwrap();
        let err = svc
            .update_paths([
                ("/Status".to_string(), serde_json::json!(1)),
                ("/Nope".to_string(), serde_json::json!(1)),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation { .. }));
        assert_eq!(svc.get("/Status"), Some(serde_json::json!(0)));
    }

    #[tokio::test]
    async fn writable_path_keeps_callback() {
        let mut svc = DbusService::new("com.victronenergy.evcharger.twc3", 42).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let cb: ChangeCallback = Arc::new(move |_p: &str, _v: &serde_json::Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        svc.add_path("/SetCurrent", serde_json::Value::Null, true, Some(cb))
            .await
            .unwrap();
        assert!(svc.is_writable("/SetCurrent"));

        let cb = lock_shared(&svc.shared)
            .callbacks
            .get("/SetCurrent")
            .cloned()
            .unwrap();
        assert!(cb("/SetCurrent", &serde_json::json!(10)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_invalid_names_and_paths() {
        assert!(DbusService::new("not a bus name", 1).is_err());
        assert!(object_path("no-leading-slash").is_err());
    }
}
