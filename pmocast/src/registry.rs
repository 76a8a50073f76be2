use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::DeviceId;
use crate::adapter::RemoteDevice;
use crate::model::DeviceSummary;

/// Receivers currently known from discovery.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, Arc<dyn RemoteDevice>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device`. Returns false if it replaced a known one.
    pub fn add(&mut self, device: Arc<dyn RemoteDevice>) -> bool {
        let id = device.id();
        debug!(device = %id, name = %device.name(), "Device discovered");
        self.devices.insert(id, device).is_none()
    }

    pub fn remove(&mut self, id: &DeviceId) -> Option<Arc<dyn RemoteDevice>> {
        let removed = self.devices.remove(id);
        if removed.is_some() {
            debug!(device = %id, "Device removed");
        }
        removed
    }

    pub fn get(&self, id: &DeviceId) -> Option<Arc<dyn RemoteDevice>> {
        self.devices.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Known devices sorted by name.
    pub fn list(&self) -> Vec<DeviceSummary> {
        let mut list: Vec<DeviceSummary> = self
            .devices
            .iter()
            .map(|(id, device)| DeviceSummary {
                id: id.clone(),
                name: device.name(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        list
    }
}
