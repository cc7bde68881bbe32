//! Compiled-in device table.
//!
//! Registered eagerly when the core loads and unregistered together on
//! unload. The only runtime failures are slot or buffer exhaustion.

use crate::drivers::create_ops;
use crate::registry::DeviceRegistry;
use pcd_common::pcd::config::{DeviceConfiguration, StaticTableKind};
use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::types::{DeviceId, DeviceKind, Permission};
use tracing::{info, warn};

/// Fixed set of device configurations.
#[derive(Debug, Clone, Default)]
pub struct StaticTable {
    entries: Vec<DeviceConfiguration>,
    registered: Vec<DeviceId>,
}

impl StaticTable {
    /// Table with the given entries, in registration order.
    pub fn new(entries: Vec<DeviceConfiguration>) -> Self {
        Self {
            entries,
            registered: Vec::new(),
        }
    }

    /// One 512-byte read/write device.
    pub fn single() -> Self {
        Self::new(vec![DeviceConfiguration::new(
            512,
            Permission::ReadWrite,
            "PCD0000SINGLE",
        )])
    }

    /// Four devices with mixed permissions.
    pub fn four_devices() -> Self {
        Self::new(vec![
            DeviceConfiguration::new(1024, Permission::ReadOnly, "PCDEV1XYIOWEFJ"),
            DeviceConfiguration::new(512, Permission::WriteOnly, "PCDEV2XYIOWEFJ"),
            DeviceConfiguration::new(1024, Permission::ReadWrite, "PCDEV3XYIOWEFJ"),
            DeviceConfiguration::new(512, Permission::ReadWrite, "PCDEV4XYIOWEFJ"),
        ])
    }

    /// Table selected by configuration; `custom` is used for `Custom`.
    pub fn from_kind(kind: StaticTableKind, custom: &[DeviceConfiguration]) -> Self {
        match kind {
            StaticTableKind::None => Self::default(),
            StaticTableKind::Single => Self::single(),
            StaticTableKind::FourDevices => Self::four_devices(),
            StaticTableKind::Custom => Self::new(custom.to_vec()),
        }
    }

    /// Configured entries.
    pub fn entries(&self) -> &[DeviceConfiguration] {
        &self.entries
    }

    /// Ids registered by the last successful `register_all`.
    pub fn registered(&self) -> &[DeviceId] {
        &self.registered
    }

    /// Register every entry.
    ///
    /// # Errors
    /// `OutOfSlots` or `OutOfMemory`; devices registered before the failure
    /// are unregistered again.
    pub fn register_all(&mut self, registry: &mut DeviceRegistry) -> Result<Vec<DeviceId>, PcdError> {
        let mut ids = Vec::with_capacity(self.entries.len());

        for (index, entry) in self.entries.iter().enumerate() {
            match registry.register(entry.clone(), create_ops(DeviceKind::Static)) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    warn!("Static device {} ({}) failed: {}", index, entry.serial_label, err);
                    for id in ids {
                        registry.unregister(id);
                    }
                    return Err(err);
                }
            }
        }

        info!("Module load successful: {} static devices", ids.len());
        self.registered.extend_from_slice(&ids);
        Ok(ids)
    }

    /// Unregister every device this table registered.
    pub fn unregister_all(&mut self, registry: &mut DeviceRegistry) -> usize {
        let removed = self
            .registered
            .drain(..)
            .filter(|&id| registry.unregister(id))
            .count();
        if removed > 0 {
            info!("Module unload successful: {} static devices", removed);
        }
        removed
    }
}
