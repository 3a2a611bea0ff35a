use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use zbus::Connection;
use zbus::zvariant::OwnedObjectPath;

/// Callback invoked when a bus client writes a writable path.
///
/// Receives the path and the written value; returning `false` rejects the
/// write and leaves the stored value unchanged.
pub type ChangeCallback = Arc<dyn Fn(&str, &serde_json::Value) -> bool + Send + Sync>;

/// Registry contents shared between a service and its exported objects
pub struct DbusSharedState {
    pub(crate) paths: HashMap<String, serde_json::Value>,
    pub(crate) writable: HashSet<String>,
    pub(crate) callbacks: HashMap<String, ChangeCallback>,
    pub(crate) connection: Option<Connection>,
    pub(crate) root_path: OwnedObjectPath,
}

impl DbusSharedState {
    pub fn new(root_path: OwnedObjectPath) -> Self {
        Self {
            paths: HashMap::new(),
            writable: HashSet::new(),
            callbacks: HashMap::new(),
            connection: None,
            root_path,
        }
    }
}

/// Lock the shared state, recovering the data if a holder panicked
pub(crate) fn lock_shared(shared: &Mutex<DbusSharedState>) -> MutexGuard<'_, DbusSharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
