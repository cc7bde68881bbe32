//! Named attribute endpoints of a device.
//!
//! `AttributeBridge` exposes selected descriptor fields as text, the way a
//! sysfs attribute group does. Values are rendered with a trailing newline;
//! stored input is trimmed before parsing.

use crate::descriptor::{DeviceDescriptor, DeviceState};
use crate::sync::Signal;
use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::gpio::GpioLine;
use pcd_common::pcd::ops::Attribute;
use pcd_common::pcd::types::{DeviceId, Direction};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Attribute group of one device.
#[derive(Debug, Clone)]
pub struct AttributeBridge {
    device_id: DeviceId,
    group: String,
    attributes: &'static [Attribute],
    descriptor: Weak<DeviceDescriptor>,
    signal: Signal,
}

impl AttributeBridge {
    pub(crate) fn new(descriptor: &Arc<DeviceDescriptor>, signal: Signal) -> Self {
        Self {
            device_id: descriptor.id(),
            group: descriptor.group_name(),
            attributes: descriptor.ops().attributes(),
            descriptor: Arc::downgrade(descriptor),
            signal,
        }
    }

    /// Device the group belongs to.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Group namespace (`pcdev-<id>` or the GPIO label).
    pub fn group_name(&self) -> &str {
        &self.group
    }

    /// Attributes exposed by the device.
    pub fn list(&self) -> &'static [Attribute] {
        self.attributes
    }

    /// `<group>/<attribute>` paths of every exposed attribute.
    pub fn paths(&self) -> Vec<String> {
        self.attributes
            .iter()
            .map(|a| format!("{}/{}", self.group, a.name()))
            .collect()
    }

    fn resolve(&self, name: &str) -> Result<(Attribute, Arc<DeviceDescriptor>), PcdError> {
        let attribute = Attribute::from_name(name)
            .filter(|a| self.attributes.contains(a))
            .ok_or_else(|| PcdError::NotFound(format!("{}/{}", self.group, name)))?;
        let descriptor = self
            .descriptor
            .upgrade()
            .ok_or_else(|| PcdError::no_device(self.device_id))?;
        Ok((attribute, descriptor))
    }

    /// Read attribute `name`.
    ///
    /// # Errors
    /// - `PcdError::NotFound` if the device does not expose `name` or is gone
    /// - `PcdError::Interrupted` if the signal ends the lock wait
    /// - `PcdError::Gpio` if the GPIO line cannot be read
    pub fn show(&self, name: &str) -> Result<String, PcdError> {
        let (attribute, descriptor) = self.resolve(name)?;
        let state = descriptor.lock(&self.signal)?;

        let value = match attribute {
            Attribute::MaxSize => state.capacity().to_string(),
            Attribute::SerialNum => descriptor.serial_label().to_string(),
            Attribute::Label => descriptor.label().unwrap_or_default().to_string(),
            Attribute::Direction => gpio(&state)?.direction().as_str().to_string(),
            Attribute::Value => u8::from(gpio(&state)?.value()?).to_string(),
        };
        Ok(format!("{value}\n"))
    }

    /// Write `input` to attribute `name`. Returns the number of bytes consumed.
    ///
    /// # Errors
    /// - `PcdError::PermissionDenied` if the attribute is read-only
    /// - `PcdError::NotFound` if the device does not expose `name` or is gone
    /// - `PcdError::InvalidArgument` if `input` does not parse
    /// - `PcdError::Busy` if a resize would strand a live channel offset
    /// - `PcdError::OutOfMemory` if growing the buffer fails
    /// - `PcdError::Interrupted` if the signal ends the lock wait
    pub fn store(&self, name: &str, input: &str) -> Result<usize, PcdError> {
        let (attribute, descriptor) = self.resolve(name)?;
        if !attribute.is_writable() {
            return Err(PcdError::PermissionDenied);
        }
        let text = input.trim();
        let mut state = descriptor.lock(&self.signal)?;

        match attribute {
            Attribute::MaxSize => {
                let capacity: u32 = text.parse().map_err(|_| {
                    PcdError::InvalidArgument(format!("max_size must be a decimal u32, got '{text}'"))
                })?;
                let old = state.capacity();
                state.resize(capacity)?;
                info!("Device {} resized from {} to {} bytes", self.device_id, old, capacity);
            }
            Attribute::Direction => {
                let direction: Direction = text.parse()?;
                gpio_mut(&mut state)?.set_direction(direction)?;
                debug!("{} direction set to {}", self.group, direction.as_str());
            }
            Attribute::Value => {
                let value = match text {
                    "0" => false,
                    "1" => true,
                    other => {
                        return Err(PcdError::InvalidArgument(format!(
                            "value must be '0' or '1', got '{other}'"
                        )));
                    }
                };
                gpio_mut(&mut state)?.set_value(value)?;
                debug!("{} value set to {}", self.group, text);
            }
            Attribute::SerialNum | Attribute::Label => return Err(PcdError::PermissionDenied),
        }
        Ok(input.len())
    }
}

fn gpio(state: &DeviceState) -> Result<&dyn GpioLine, PcdError> {
    state
        .gpio()
        .ok_or_else(|| PcdError::Gpio("device has no GPIO line".to_string()))
}

fn gpio_mut(state: &mut DeviceState) -> Result<&mut (dyn GpioLine + 'static), PcdError> {
    state
        .gpio_mut()
        .ok_or_else(|| PcdError::Gpio("device has no GPIO line".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::pcdev::{StaticDeviceOps, SysfsDeviceOps};
    use crate::drivers::simulation::SimulatedGpioController;
    use pcd_common::pcd::config::DeviceConfiguration;
    use pcd_common::pcd::gpio::GpioController;
    use pcd_common::pcd::types::Permission;

    fn pcdev(capacity: u32) -> Arc<DeviceDescriptor> {
        Arc::new(
            DeviceDescriptor::new(
                DeviceId(2),
                DeviceConfiguration::new(capacity, Permission::ReadWrite, "SER123"),
                Box::new(StaticDeviceOps),
            )
            .unwrap(),
        )
    }

    #[test]
    fn show_pcdev_attributes() {
        let desc = pcdev(512);
        let attrs = AttributeBridge::new(&desc, Signal::new());

        assert_eq!(attrs.group_name(), "pcdev-2");
        assert_eq!(attrs.paths(), vec!["pcdev-2/max_size", "pcdev-2/serial_num"]);
        assert_eq!(attrs.show("max_size").unwrap(), "512\n");
        assert_eq!(attrs.show("serial_num").unwrap(), "SER123\n");
        assert!(matches!(attrs.show("value"), Err(PcdError::NotFound(_))));
        assert!(matches!(attrs.show("bogus"), Err(PcdError::NotFound(_))));
    }

    #[test]
    fn store_max_size() {
        let desc = pcdev(512);
        let attrs = AttributeBridge::new(&desc, Signal::new());

        assert_eq!(attrs.store("max_size", "1024\n"), Ok(5));
        assert_eq!(attrs.show("max_size").unwrap(), "1024\n");
        assert!(matches!(
            attrs.store("max_size", "-3"),
            Err(PcdError::InvalidArgument(_))
        ));
        assert_eq!(
            attrs.store("serial_num", "NEW"),
            Err(PcdError::PermissionDenied)
        );
    }

    #[test]
    fn contended_attribute_access_is_interrupted() {
        let desc = pcdev(512);
        let signal = Signal::new();
        let attrs = AttributeBridge::new(&desc, signal.clone());
        let held = desc.lock_uninterruptible();

        signal.raise();
        assert_eq!(attrs.show("max_size"), Err(PcdError::Interrupted));
        assert_eq!(attrs.store("max_size", "1024"), Err(PcdError::Interrupted));

        drop(held);
        assert_eq!(attrs.show("max_size").unwrap(), "512\n");
        signal.clear();
        assert_eq!(attrs.store("max_size", "1024"), Ok(4));
        assert_eq!(desc.lock_uninterruptible().capacity(), 1024);
    }

    #[test]
    fn gpio_attributes_delegate_to_line() {
        let mut controller = SimulatedGpioController::new(8);
        let line = controller.request(5, "led5").unwrap();
        let desc = Arc::new(DeviceDescriptor::new_gpio(
            DeviceId(0),
            "led5",
            line,
            Box::new(SysfsDeviceOps),
        ));
        let attrs = AttributeBridge::new(&desc, Signal::new());

        assert_eq!(attrs.group_name(), "led5");
        assert_eq!(attrs.show("label").unwrap(), "led5\n");
        assert_eq!(attrs.show("direction").unwrap(), "in\n");
        assert!(matches!(attrs.show("max_size"), Err(PcdError::NotFound(_))));

        attrs.store("direction", "out").unwrap();
        attrs.store("value", "1").unwrap();
        assert_eq!(attrs.show("value").unwrap(), "1\n");
        assert_eq!(controller.level(5), Some(true));

        assert!(matches!(
            attrs.store("direction", "sideways"),
            Err(PcdError::InvalidArgument(_))
        ));
        assert_eq!(attrs.store("label", "x"), Err(PcdError::PermissionDenied));
    }

    #[test]
    fn removed_device_is_not_found() {
        let desc = pcdev(8);
        let attrs = AttributeBridge::new(&desc, Signal::new());
        drop(desc);
        assert!(matches!(attrs.show("max_size"), Err(PcdError::NotFound(_))));
    }
}
