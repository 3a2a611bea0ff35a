//! D-Bus integration for Venus OS compatibility
//!
//! Each published device is a [`DbusService`]: a well-known name on the
//! bus and a tree of `com.victronenergy.BusItem` objects backed by a
//! shared path registry.

mod items;
mod root;
mod service;
mod shared;
mod util;

pub use items::BusItem;
pub use root::{RootBus, TreeNode};
pub use service::DbusService;
pub use shared::ChangeCallback;

use zbus::Connection;

use crate::error::{BridgeError, Result};

/// Open a private connection to the bus the GX services live on.
///
/// The session bus is used when `DBUS_SESSION_BUS_ADDRESS` is set (desktop
/// development), otherwise the system bus.
pub async fn connect_bus() -> Result<Connection> {
    if std::env::var_os("DBUS_SESSION_BUS_ADDRESS").is_some() {
        Connection::session()
            .await
            .map_err(|e| BridgeError::dbus(format!("Session bus connect failed: {}", e)))
    } else {
        Connection::system()
            .await
            .map_err(|e| BridgeError::dbus(format!("System bus connect failed: {}", e)))
    }
}
