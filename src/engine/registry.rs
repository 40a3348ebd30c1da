//! Connection/Device Registry
//!
//! Tracks which edge devices are currently online, independent of the
//! sensor data flow. A single set backs everything; its size is the only
//! connected-device count the rest of the system ever reports.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<RwLock<HashSet<String>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a device online. Returns true if it was not already present.
    pub fn mark_online(&self, device_id: &str) -> bool {
        let added = self.devices.write().insert(device_id.to_string());
        if added {
            log::info!(
                "device {} online, total connected: {}",
                device_id,
                self.count()
            );
        }
        added
    }

    /// Mark a device offline. Returns true if it was present.
    pub fn mark_offline(&self, device_id: &str) -> bool {
        let removed = self.devices.write().remove(device_id);
        if removed {
            log::info!(
                "device {} offline, total connected: {}",
                device_id,
                self.count()
            );
        }
        removed
    }

    pub fn is_online(&self, device_id: &str) -> bool {
        self.devices.read().contains(device_id)
    }

    pub fn count(&self) -> usize {
        self.devices.read().len()
    }

    pub fn devices(&self) -> Vec<String> {
        self.devices.read().iter().cloned().collect()
    }
}
