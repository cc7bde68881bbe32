//! Device registry.
//!
//! `DeviceRegistry` is an id-indexed arena of descriptors. Ids are slot
//! indices; registration takes the lowest free slot. Descriptors are fully
//! built before insertion, so lookups never see a half-constructed device.

use crate::descriptor::DeviceDescriptor;
use crate::drivers::pcdev::SysfsDeviceOps;
use pcd_common::pcd::config::DeviceConfiguration;
use pcd_common::pcd::consts::{DEVICE_ID_LIMIT, MAX_DEVICES};
use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::gpio::GpioLine;
use pcd_common::pcd::ops::FileOperations;
use pcd_common::pcd::types::DeviceId;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of live device descriptors.
///
/// Constructed by `PcdCore` and mutated only through it, so callers never
/// need global state.
pub struct DeviceRegistry {
    slots: Vec<Option<Arc<DeviceDescriptor>>>,
    max_devices: usize,
}

impl DeviceRegistry {
    /// Create an empty registry with room for `max_devices` devices.
    ///
    /// The value is clamped to `1..=DEVICE_ID_LIMIT`.
    pub fn new(max_devices: usize) -> Self {
        let max_devices = max_devices.clamp(1, DEVICE_ID_LIMIT);
        Self {
            slots: Vec::with_capacity(max_devices),
            max_devices,
        }
    }

    fn free_slot(&self) -> Result<usize, PcdError> {
        if let Some(index) = self.slots.iter().position(Option::is_none) {
            return Ok(index);
        }
        if self.slots.len() < self.max_devices {
            return Ok(self.slots.len());
        }
        Err(PcdError::OutOfSlots(self.max_devices))
    }

    fn insert(&mut self, index: usize, descriptor: DeviceDescriptor) {
        let descriptor = Some(Arc::new(descriptor));
        if index == self.slots.len() {
            self.slots.push(descriptor);
        } else {
            self.slots[index] = descriptor;
        }
    }

    /// Register a buffer-backed device.
    ///
    /// # Errors
    /// - `PcdError::OutOfSlots` if every slot is taken
    /// - `PcdError::OutOfMemory` if the buffer cannot be allocated
    ///
    /// The registry is unchanged on error.
    pub fn register(
        &mut self,
        configuration: DeviceConfiguration,
        ops: Box<dyn FileOperations>,
    ) -> Result<DeviceId, PcdError> {
        let index = self.free_slot()?;
        let id = DeviceId(index as u32);
        let kind = ops.kind();
        let descriptor = DeviceDescriptor::new(id, configuration, ops)?;

        info!(
            "Registered {} device {} ({} bytes, {}, serial {})",
            kind.as_str(),
            id,
            descriptor.configuration().capacity_bytes,
            descriptor.permission(),
            descriptor.serial_label()
        );
        self.insert(index, descriptor);
        Ok(id)
    }

    /// Register an attribute-only device around a requested GPIO line.
    ///
    /// # Errors
    /// `PcdError::OutOfSlots` if every slot is taken; the line is released.
    pub fn register_gpio(
        &mut self,
        label: &str,
        line: Box<dyn GpioLine>,
    ) -> Result<DeviceId, PcdError> {
        let index = self.free_slot()?;
        let id = DeviceId(index as u32);
        let descriptor = DeviceDescriptor::new_gpio(id, label, line, Box::new(SysfsDeviceOps));

        info!("Registered GPIO device {} ({})", id, label);
        self.insert(index, descriptor);
        Ok(id)
    }

    /// Remove device `id`. Returns `false` if it was not registered.
    ///
    /// Open channels keep working until they notice the removal on their
    /// next operation.
    pub fn unregister(&mut self, id: DeviceId) -> bool {
        match self.slots.get_mut(id.index()).and_then(Option::take) {
            Some(descriptor) => {
                info!("Unregistered device {} ({})", id, descriptor.group_name());
                true
            }
            None => {
                debug!("Device {} already unregistered", id);
                false
            }
        }
    }

    /// Resolve device `id`.
    ///
    /// # Errors
    /// `PcdError::NotFound` if no such device is registered.
    pub fn lookup(&self, id: DeviceId) -> Result<Arc<DeviceDescriptor>, PcdError> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .cloned()
            .ok_or_else(|| PcdError::no_device(id))
    }

    /// Number of live devices.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Ids of live devices, ascending.
    pub fn ids(&self) -> Vec<DeviceId> {
        self.iter().map(|d| d.id()).collect()
    }

    /// Live descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeviceDescriptor>> {
        self.slots.iter().flatten()
    }

    /// Slot limit.
    pub fn max_devices(&self) -> usize {
        self.max_devices
    }

    /// Unregister every device. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.count();
        self.slots.clear();
        if removed > 0 {
            info!("Unregistered {} devices", removed);
        }
        removed
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(MAX_DEVICES)
    }
}
