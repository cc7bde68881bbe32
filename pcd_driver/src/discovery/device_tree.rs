//! Device-tree matching.
//!
//! Two node shapes are handled:
//! - pcdev nodes (`pcdev-A1x` .. `pcdev-D1x`, optionally `org,`-prefixed)
//!   carry `device-serial-num`, `size` and `perm` and become one device.
//! - `org,bone-gpio-sysfs` nodes carry one child per GPIO line; each child
//!   becomes an attribute-only device.
//!
//! A probe is atomic per node: on failure nothing stays registered.

use super::{BusDevice, BusDeviceId, BusDriver};
use crate::drivers::create_ops;
use crate::registry::DeviceRegistry;
use pcd_common::pcd::config::{DeviceConfiguration, DeviceNode, DriverData};
use pcd_common::pcd::consts::{
    GPIO_LABEL_MAX, GPIO_SYSFS_COMPATIBLE, PCDEV_DRIVER_DATA, PCDEV_NAMES, PROP_GPIO, PROP_LABEL,
    PROP_PERM, PROP_SERIAL, PROP_SIZE,
};
use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::gpio::GpioController;
use pcd_common::pcd::types::{DeviceId, DeviceKind, Permission};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Parse the configuration of a pcdev node.
///
/// Properties are read in the order serial, size, perm; the first missing
/// one is reported.
pub fn parse_pcdev_node(node: &DeviceNode) -> Result<DeviceConfiguration, PcdError> {
    let serial = node.read_string(PROP_SERIAL)?;
    let size = node.read_u32(PROP_SIZE)?;
    let perm = Permission::from_raw(node.read_u32(PROP_PERM)?)?;

    let mut configuration = DeviceConfiguration::new(size, perm, serial);
    if let Some(index) = pcdev_index(node) {
        let (config_item1, config_item2) = PCDEV_DRIVER_DATA[index];
        configuration = configuration.with_driver_data(DriverData {
            config_item1,
            config_item2,
        });
    }
    Ok(configuration)
}

fn pcdev_index(node: &DeviceNode) -> Option<usize> {
    PCDEV_NAMES.iter().position(|name| node.is_compatible(name))
}

/// Device-tree bus driver.
#[derive(Default)]
pub struct DeviceTreeMatch {
    bindings: HashMap<String, Vec<DeviceId>>,
    gpio: Option<Box<dyn GpioController>>,
}

impl DeviceTreeMatch {
    /// Create a driver without a GPIO controller.
    ///
    /// GPIO nodes fail to probe until one is supplied.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `controller` to request the lines of GPIO nodes.
    pub fn with_gpio_controller(mut self, controller: Box<dyn GpioController>) -> Self {
        self.gpio = Some(controller);
        self
    }

    /// Number of bound nodes.
    pub fn bound(&self) -> usize {
        self.bindings.len()
    }

    fn probe_pcdev(
        &mut self,
        registry: &mut DeviceRegistry,
        node: &DeviceNode,
    ) -> Result<Vec<DeviceId>, PcdError> {
        let configuration = parse_pcdev_node(node)?;
        info!("Device serial number = {}", configuration.serial_label);
        info!("Device size = {}", configuration.capacity_bytes);
        info!("Device permission = {}", configuration.permission);

        let id = registry.register(configuration, create_ops(DeviceKind::DeviceTree))?;
        Ok(vec![id])
    }

    fn probe_gpio(
        &mut self,
        registry: &mut DeviceRegistry,
        node: &DeviceNode,
    ) -> Result<Vec<DeviceId>, PcdError> {
        let controller = self.gpio.as_mut().ok_or_else(|| {
            PcdError::InvalidArgument("no GPIO controller configured".to_string())
        })?;
        if node.children.is_empty() {
            return Err(PcdError::InvalidArgument(format!(
                "{} has no GPIO children",
                node.path
            )));
        }

        let mut ids = Vec::with_capacity(node.children.len());
        for child in &node.children {
            match probe_gpio_child(&mut **controller, registry, child) {
                Ok(id) => ids.push(id),
                Err(err) => {
                    for id in ids {
                        registry.unregister(id);
                    }
                    return Err(err);
                }
            }
        }

        info!("Total devices probed = {}", ids.len());
        Ok(ids)
    }
}

fn probe_gpio_child(
    controller: &mut dyn GpioController,
    registry: &mut DeviceRegistry,
    child: &DeviceNode,
) -> Result<DeviceId, PcdError> {
    let label = match child.read_string(PROP_LABEL) {
        Ok(label) => label,
        Err(PcdError::MissingProperty(_)) => {
            debug!("{} has no label, using node name", child.path);
            child.name()
        }
        Err(err) => return Err(err),
    };
    if label.len() > GPIO_LABEL_MAX {
        return Err(PcdError::InvalidProperty(format!(
            "{PROP_LABEL} '{label}' longer than {GPIO_LABEL_MAX}"
        )));
    }

    let line = child.read_u32(PROP_GPIO)?;
    let handle = controller.request(line, label)?;
    info!("GPIO label = {}, line = {}", label, line);
    registry.register_gpio(label, handle)
}

impl BusDriver for DeviceTreeMatch {
    fn name(&self) -> &'static str {
        "device-tree"
    }

    fn matches(&self, device: &BusDevice) -> bool {
        match device {
            BusDevice::Node(node) => {
                node.is_compatible(GPIO_SYSFS_COMPATIBLE) || pcdev_index(node).is_some()
            }
            BusDevice::Platform(_) => false,
        }
    }

    fn probe(
        &mut self,
        registry: &mut DeviceRegistry,
        device: &BusDevice,
    ) -> Result<Vec<DeviceId>, PcdError> {
        let BusDevice::Node(node) = device else {
            return Err(PcdError::InvalidArgument("not a device-tree node".to_string()));
        };
        info!("A device is detected: {}", node.path);

        if self.bindings.contains_key(&node.path) {
            return Err(PcdError::Busy);
        }

        let result = if node.is_compatible(GPIO_SYSFS_COMPATIBLE) {
            self.probe_gpio(registry, node)
        } else {
            self.probe_pcdev(registry, node)
        };

        match result {
            Ok(ids) => {
                info!("Probe was successful: {} -> {} devices", node.path, ids.len());
                self.bindings.insert(node.path.clone(), ids.clone());
                Ok(ids)
            }
            Err(err) => {
                warn!("Probe of {} failed: {}", node.path, err);
                Err(err)
            }
        }
    }

    fn remove(&mut self, registry: &mut DeviceRegistry, id: &BusDeviceId) -> usize {
        let BusDeviceId::Node(path) = id else {
            return 0;
        };
        let Some(ids) = self.bindings.remove(path) else {
            return 0;
        };
        let removed = ids.into_iter().filter(|&id| registry.unregister(id)).count();
        info!("A device is removed: {} ({} devices)", path, removed);
        removed
    }

    fn remove_all(&mut self, registry: &mut DeviceRegistry) -> usize {
        self.bindings
            .drain()
            .flat_map(|(_, ids)| ids)
            .filter(|&id| registry.unregister(id))
            .count()
    }
}
