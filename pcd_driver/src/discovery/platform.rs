//! Platform bus matching.
//!
//! A platform device matches by driver name or by an id-table entry. An
//! id-table match selects the driver data of that entry. The device's
//! configuration comes from its platform data blob.

use super::{BusDevice, BusDeviceId, BusDriver};
use crate::drivers::create_ops;
use crate::registry::DeviceRegistry;
use pcd_common::pcd::config::{DriverData, PlatformDevice};
use pcd_common::pcd::consts::{PCDEV_DRIVER_DATA, PCDEV_NAMES, PLATFORM_DRIVER_NAME};
use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::types::{DeviceId, DeviceKind};
use std::collections::HashMap;
use tracing::{info, warn};

/// Driver data of the id-table entry named `name`.
pub fn id_table_match(name: &str) -> Option<DriverData> {
    PCDEV_NAMES
        .iter()
        .position(|&entry| entry == name)
        .map(|index| {
            let (config_item1, config_item2) = PCDEV_DRIVER_DATA[index];
            DriverData {
                config_item1,
                config_item2,
            }
        })
}

/// Platform bus driver.
#[derive(Debug, Default)]
pub struct PlatformMatch {
    bindings: HashMap<String, DeviceId>,
}

impl PlatformMatch {
    /// Create a driver with no bound devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound devices.
    pub fn bound(&self) -> usize {
        self.bindings.len()
    }

    fn probe_platform(
        &mut self,
        registry: &mut DeviceRegistry,
        device: &PlatformDevice,
    ) -> Result<DeviceId, PcdError> {
        info!("A device is detected: {}", device.bus_name());

        let bus_name = device.bus_name();
        if self.bindings.contains_key(&bus_name) {
            return Err(PcdError::Busy);
        }

        let mut configuration = device
            .platform_data
            .clone()
            .ok_or_else(|| PcdError::InvalidArgument("no platform data".to_string()))?;
        if let Some(data) = id_table_match(&device.name) {
            configuration = configuration.with_driver_data(data);
        }

        info!("Device serial number = {}", configuration.serial_label);
        info!("Device size = {}", configuration.capacity_bytes);
        info!("Device permission = {}", configuration.permission);
        if let Some(data) = configuration.driver_data {
            info!(
                "Config item 1 = {}, config item 2 = {}",
                data.config_item1, data.config_item2
            );
        }

        let id = registry.register(configuration, create_ops(DeviceKind::Platform))?;
        self.bindings.insert(bus_name, id);
        info!("Probe was successful: {} -> device {}", device.bus_name(), id);
        Ok(id)
    }
}

impl BusDriver for PlatformMatch {
    fn name(&self) -> &'static str {
        PLATFORM_DRIVER_NAME
    }

    fn matches(&self, device: &BusDevice) -> bool {
        match device {
            BusDevice::Platform(dev) => {
                dev.name == PLATFORM_DRIVER_NAME || id_table_match(&dev.name).is_some()
            }
            BusDevice::Node(_) => false,
        }
    }

    fn probe(
        &mut self,
        registry: &mut DeviceRegistry,
        device: &BusDevice,
    ) -> Result<Vec<DeviceId>, PcdError> {
        let BusDevice::Platform(dev) = device else {
            return Err(PcdError::InvalidArgument("not a platform device".to_string()));
        };
        match self.probe_platform(registry, dev) {
            Ok(id) => Ok(vec![id]),
            Err(err) => {
                warn!("Probe of {} failed: {}", dev.bus_name(), err);
                Err(err)
            }
        }
    }

    fn remove(&mut self, registry: &mut DeviceRegistry, id: &BusDeviceId) -> usize {
        let BusDeviceId::Platform(bus_name) = id else {
            return 0;
        };
        match self.bindings.remove(bus_name) {
            Some(device_id) => {
                let removed = usize::from(registry.unregister(device_id));
                info!("A device is removed: {}", bus_name);
                removed
            }
            None => 0,
        }
    }

    fn remove_all(&mut self, registry: &mut DeviceRegistry) -> usize {
        self.bindings
            .drain()
            .filter(|&(_, id)| registry.unregister(id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcd_common::pcd::config::DeviceConfiguration;
    use pcd_common::pcd::types::Permission;

    fn platform(name: &str, id: i32) -> BusDevice {
        BusDevice::Platform(PlatformDevice::new(
            name,
            id,
            DeviceConfiguration::new(512, Permission::ReadWrite, "PLAT0"),
        ))
    }

    #[test]
    fn matches_driver_name_and_id_table() {
        let driver = PlatformMatch::new();
        assert!(driver.matches(&platform("pseudo-char-device", 0)));
        assert!(driver.matches(&platform("pcdev-C1x", 2)));
        assert!(!driver.matches(&platform("something-else", 0)));
    }

    #[test]
    fn probe_attaches_driver_data() {
        let mut registry = DeviceRegistry::new(4);
        let mut driver = PlatformMatch::new();

        let ids = driver.probe(&mut registry, &platform("pcdev-B1x", 1)).unwrap();
        let desc = registry.lookup(ids[0]).unwrap();
        assert_eq!(desc.kind(), DeviceKind::Platform);
        assert_eq!(
            desc.configuration().driver_data,
            Some(DriverData {
                config_item1: 50,
                config_item2: 22
            })
        );

        let ids = driver
            .probe(&mut registry, &platform("pseudo-char-device", 0))
            .unwrap();
        assert_eq!(registry.lookup(ids[0]).unwrap().configuration().driver_data, None);
    }

    #[test]
    fn probe_without_platform_data_fails() {
        let mut registry = DeviceRegistry::new(4);
        let mut driver = PlatformMatch::new();
        let bare = BusDevice::Platform(PlatformDevice {
            name: "pcdev-A1x".into(),
            id: 0,
            platform_data: None,
        });

        assert!(matches!(
            driver.probe(&mut registry, &bare),
            Err(PcdError::InvalidArgument(_))
        ));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn duplicate_bus_name_is_busy() {
        let mut registry = DeviceRegistry::new(4);
        let mut driver = PlatformMatch::new();
        driver.probe(&mut registry, &platform("pcdev-A1x", 0)).unwrap();

        assert_eq!(
            driver.probe(&mut registry, &platform("pcdev-A1x", 0)),
            Err(PcdError::Busy)
        );
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = DeviceRegistry::new(4);
        let mut driver = PlatformMatch::new();
        let dev = platform("pcdev-A1x", 0);
        driver.probe(&mut registry, &dev).unwrap();
        driver.probe(&mut registry, &platform("pcdev-D1x", 3)).unwrap();
        assert_eq!(driver.bound(), 2);

        assert_eq!(driver.remove(&mut registry, &dev.bus_id()), 1);
        assert_eq!(driver.remove(&mut registry, &dev.bus_id()), 0);
        assert_eq!(driver.bound(), 1);
        assert_eq!(registry.count(), 1);
        assert_eq!(driver.remove_all(&mut registry), 1);
        assert_eq!(driver.bound(), 0);
        assert_eq!(registry.count(), 0);
    }
}
