//! PCD Core struct and discovery event handling.
//!
//! The `PcdCore` struct is the main entry point of the device core. It owns
//! the registry, the bus drivers and the static tables, consumes discovery
//! events, and hands out channels and attribute groups.

use crate::attribute::AttributeBridge;
use crate::channel::IoChannel;
use crate::descriptor::DeviceDescriptor;
use crate::discovery::{
    BusDriver, DeviceTreeMatch, DiscoveryBus, DiscoveryEvent, PlatformMatch, ProbeStatus,
    StaticTable,
};
use crate::drivers::simulation;
use crate::registry::DeviceRegistry;
use crate::sync::Signal;
use pcd_common::pcd::config::PcdConfig;
use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::gpio::GpioController;
use pcd_common::pcd::types::{AccessMode, DeviceId, DeviceKind, Permission};
use serde::Serialize;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot of one registered device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// Registry id
    pub id: DeviceId,
    /// Operation variant
    pub kind: DeviceKind,
    /// Attribute group name
    pub group: String,
    /// Live capacity in bytes
    pub capacity: u32,
    /// Declared permission
    pub permission: Permission,
    /// Serial number label
    pub serial: String,
    /// Attribute values, trailing newline stripped
    pub attributes: BTreeMap<String, String>,
}

/// PCD Core manages device lifecycle, discovery and access.
///
/// Lock order: drivers, then static tables, then registry.
pub struct PcdCore {
    /// Live descriptors; bus events write, lookups read
    registry: RwLock<DeviceRegistry>,
    /// Bus drivers tried in order on attach
    drivers: Mutex<Vec<Box<dyn BusDriver>>>,
    /// Static tables loaded so far
    static_tables: Mutex<Vec<StaticTable>>,
    /// Default signal handed to channels and attribute groups
    signal: Signal,
}

impl PcdCore {
    /// Create a core with the platform and device-tree drivers and no GPIO
    /// controller.
    pub fn new(max_devices: usize) -> Self {
        Self::with_drivers(
            max_devices,
            vec![
                Box::new(PlatformMatch::new()) as Box<dyn BusDriver>,
                Box::new(DeviceTreeMatch::new()),
            ],
        )
    }

    /// Create a core whose device-tree driver requests lines from `controller`.
    pub fn with_gpio_controller(max_devices: usize, controller: Box<dyn GpioController>) -> Self {
        info!("Using GPIO controller '{}'", controller.name());
        Self::with_drivers(
            max_devices,
            vec![
                Box::new(PlatformMatch::new()) as Box<dyn BusDriver>,
                Box::new(DeviceTreeMatch::new().with_gpio_controller(controller)),
            ],
        )
    }

    /// Create a core with an explicit driver list.
    pub fn with_drivers(max_devices: usize, drivers: Vec<Box<dyn BusDriver>>) -> Self {
        let registry = DeviceRegistry::new(max_devices);
        info!(
            "PcdCore created with max_devices={}, drivers={:?}",
            registry.max_devices(),
            drivers.iter().map(|d| d.name()).collect::<Vec<_>>()
        );

        Self {
            registry: RwLock::new(registry),
            drivers: Mutex::new(drivers),
            static_tables: Mutex::new(Vec::new()),
            signal: Signal::new(),
        }
    }

    /// Build a core from configuration and register its static table.
    ///
    /// GPIO nodes use a simulated controller with `gpio_lines` lines.
    ///
    /// # Errors
    /// Returns the static table's registration error.
    pub fn from_config(config: &PcdConfig) -> Result<Self, PcdError> {
        let core = Self::with_gpio_controller(
            config.max_devices,
            simulation::create_controller(config.gpio_lines),
        );
        core.load_static(StaticTable::from_kind(
            config.static_table,
            &config.static_devices,
        ))?;
        Ok(core)
    }

    fn registry_read(&self) -> RwLockReadGuard<'_, DeviceRegistry> {
        self.registry.read()
    }

    fn registry_write(&self) -> RwLockWriteGuard<'_, DeviceRegistry> {
        self.registry.write()
    }

    fn drivers(&self) -> MutexGuard<'_, Vec<Box<dyn BusDriver>>> {
        self.drivers.lock()
    }

    fn static_tables(&self) -> MutexGuard<'_, Vec<StaticTable>> {
        self.static_tables.lock()
    }

    /// Append a bus driver; it is tried after the existing ones.
    pub fn register_driver(&self, driver: Box<dyn BusDriver>) {
        debug!("Registered bus driver '{}'", driver.name());
        self.drivers().push(driver);
    }

    /// Register every entry of `table`.
    ///
    /// # Errors
    /// `OutOfSlots` or `OutOfMemory`; nothing from this table stays registered.
    pub fn load_static(&self, mut table: StaticTable) -> Result<Vec<DeviceId>, PcdError> {
        let mut tables = self.static_tables();
        let ids = table.register_all(&mut self.registry_write())?;
        if !ids.is_empty() {
            tables.push(table);
        }
        Ok(ids)
    }

    /// Unregister every static device.
    pub fn unload_static(&self) -> usize {
        let mut tables = self.static_tables();
        let mut registry = self.registry_write();
        tables
            .drain(..)
            .map(|mut table| table.unregister_all(&mut registry))
            .sum()
    }

    /// Apply one discovery event.
    pub fn handle_event(&self, event: DiscoveryEvent) -> ProbeStatus {
        let mut drivers = self.drivers();

        match event {
            DiscoveryEvent::Attach(device) => {
                let Some(driver) = drivers.iter_mut().find(|d| d.matches(&device)) else {
                    debug!("No driver matches {:?}", device.bus_id());
                    return ProbeStatus::NoMatch;
                };
                let mut registry = self.registry_write();
                match driver.probe(&mut registry, &device) {
                    Ok(ids) => ProbeStatus::Bound(ids),
                    Err(err) => {
                        warn!(
                            "Driver '{}' failed to probe {:?}: {} (status {})",
                            driver.name(),
                            device.bus_id(),
                            err,
                            err.errno()
                        );
                        ProbeStatus::Failed(err)
                    }
                }
            }
            DiscoveryEvent::Detach(id) => {
                let mut registry = self.registry_write();
                let removed = drivers
                    .iter_mut()
                    .map(|d| d.remove(&mut registry, &id))
                    .sum::<usize>();
                if removed == 0 {
                    debug!("Detach of {:?} removed nothing", id);
                }
                ProbeStatus::Removed(removed)
            }
        }
    }

    /// Drain `bus` and apply every queued event in order.
    pub fn process(&self, bus: &DiscoveryBus) -> Vec<ProbeStatus> {
        bus.drain()
            .into_iter()
            .map(|event| self.handle_event(event))
            .collect()
    }

    /// Resolve device `id`.
    pub fn lookup(&self, id: DeviceId) -> Result<Arc<DeviceDescriptor>, PcdError> {
        self.registry_read().lookup(id)
    }

    /// Open a channel on device `id` using the core's signal.
    ///
    /// # Errors
    /// - `PcdError::NotFound` if no such device is registered
    /// - `PcdError::PermissionDenied` if the device refuses `mode`
    pub fn open(&self, id: DeviceId, mode: AccessMode) -> Result<IoChannel, PcdError> {
        self.open_with_signal(id, mode, self.signal.clone())
    }

    /// Open a channel whose lock waits are interrupted by `signal`.
    pub fn open_with_signal(
        &self,
        id: DeviceId,
        mode: AccessMode,
        signal: Signal,
    ) -> Result<IoChannel, PcdError> {
        let descriptor = self.lookup(id)?;
        IoChannel::open(&descriptor, mode, signal)
    }

    /// Attribute group of device `id`.
    pub fn attributes(&self, id: DeviceId) -> Result<AttributeBridge, PcdError> {
        let descriptor = self.lookup(id)?;
        Ok(AttributeBridge::new(&descriptor, self.signal.clone()))
    }

    /// `<group>/<attribute>` paths of every device.
    pub fn attribute_paths(&self) -> Vec<String> {
        self.registry_read()
            .iter()
            .flat_map(|d| AttributeBridge::new(d, self.signal.clone()).paths())
            .collect()
    }

    /// Number of live devices.
    pub fn device_count(&self) -> usize {
        self.registry_read().count()
    }

    /// Ids of live devices, ascending.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.registry_read().ids()
    }

    /// Slot limit.
    pub fn max_devices(&self) -> usize {
        self.registry_read().max_devices()
    }

    /// Snapshot every live device with its attribute values.
    ///
    /// # Errors
    /// Returns the first attribute read error.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>, PcdError> {
        let descriptors: Vec<_> = self.registry_read().iter().cloned().collect();

        descriptors
            .iter()
            .map(|descriptor| -> Result<DeviceInfo, PcdError> {
                let bridge = AttributeBridge::new(descriptor, self.signal.clone());
                let mut attributes = BTreeMap::new();
                for attribute in bridge.list() {
                    let value = bridge.show(attribute.name())?;
                    attributes.insert(attribute.name().to_string(), value.trim_end().to_string());
                }
                let capacity = descriptor.lock(&self.signal)?.capacity();

                Ok(DeviceInfo {
                    id: descriptor.id(),
                    kind: descriptor.kind(),
                    group: bridge.group_name().to_string(),
                    capacity,
                    permission: descriptor.permission(),
                    serial: descriptor.serial_label().to_string(),
                    attributes,
                })
            })
            .collect()
    }

    /// Signal shared with channels opened through [`PcdCore::open`].
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Unregister every device: bus bindings, static tables, then leftovers.
    ///
    /// Returns how many devices were removed.
    pub fn shutdown(&self) -> usize {
        let mut drivers = self.drivers();
        let mut tables = self.static_tables();
        let mut registry = self.registry_write();

        let mut removed: usize = drivers.iter_mut().map(|d| d.remove_all(&mut registry)).sum();
        removed += tables
            .drain(..)
            .map(|mut table| table.unregister_all(&mut registry))
            .sum::<usize>();
        removed += registry.clear();

        info!("PcdCore shutdown: {} devices removed", removed);
        removed
    }
}

impl Drop for PcdCore {
    fn drop(&mut self) {
        if self.device_count() > 0 {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{BusDevice, BusDeviceId};
    use pcd_common::pcd::config::{DeviceConfiguration, DeviceNode, PlatformDevice};
    use pcd_common::pcd::types::Whence;

    fn platform(name: &str, id: i32, size: u32) -> BusDevice {
        BusDevice::Platform(PlatformDevice::new(
            name,
            id,
            DeviceConfiguration::new(size, Permission::ReadWrite, format!("PLAT{id}")),
        ))
    }

    #[test]
    fn attach_and_detach_platform_device() {
        let core = PcdCore::new(4);
        let dev = platform("pcdev-A1x", 0, 64);

        let status = core.handle_event(DiscoveryEvent::Attach(dev.clone()));
        assert_eq!(status, ProbeStatus::Bound(vec![DeviceId(0)]));
        assert_eq!(core.device_count(), 1);

        let status = core.handle_event(DiscoveryEvent::Detach(dev.bus_id()));
        assert_eq!(status, ProbeStatus::Removed(1));
        let status = core.handle_event(DiscoveryEvent::Detach(dev.bus_id()));
        assert_eq!(status, ProbeStatus::Removed(0));
        assert_eq!(core.device_count(), 0);
    }

    #[test]
    fn registered_driver_handles_later_attach() {
        let core = PcdCore::with_drivers(4, Vec::new());
        let dev = platform("pcdev-C1x", 2, 32);
        assert_eq!(core.handle_event(DiscoveryEvent::Attach(dev.clone())), ProbeStatus::NoMatch);

        core.register_driver(Box::new(PlatformMatch::new()));
        let status = core.handle_event(DiscoveryEvent::Attach(dev));
        assert_eq!(status, ProbeStatus::Bound(vec![DeviceId(0)]));
        assert_eq!(core.device_count(), 1);
    }

    #[test]
    fn unmatched_device_reports_no_device() {
        let core = PcdCore::new(4);
        let status = core.handle_event(DiscoveryEvent::Attach(platform("unknown", 0, 8)));
        assert_eq!(status, ProbeStatus::NoMatch);
        assert_eq!(status.code(), -libc::ENODEV);
    }

    #[test]
    fn failed_probe_leaves_other_devices() {
        let core = PcdCore::new(4);
        core.handle_event(DiscoveryEvent::Attach(platform("pcdev-A1x", 0, 8)));

        let node = DeviceNode::new("/pcdev-2", "org,pcdev-B1x").with_property("org,size", 8);
        let status = core.handle_event(DiscoveryEvent::Attach(BusDevice::Node(node)));
        assert!(matches!(status, ProbeStatus::Failed(PcdError::MissingProperty(_))));
        assert!(status.code() < 0);
        assert_eq!(core.device_count(), 1);
    }

    #[test]
    fn process_drains_bus() {
        let core = PcdCore::new(4);
        let bus = DiscoveryBus::new();
        bus.attach(platform("pcdev-A1x", 0, 8));
        bus.attach(platform("pcdev-B1x", 1, 8));
        bus.detach(BusDeviceId::Platform("pcdev-A1x.0".into()));

        let statuses = core.process(&bus);
        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().all(ProbeStatus::is_ok));
        assert_eq!(core.device_ids(), vec![DeviceId(1)]);
    }

    #[test]
    fn open_after_detach_is_not_found() {
        let core = PcdCore::new(4);
        let dev = platform("pcdev-A1x", 0, 8);
        core.handle_event(DiscoveryEvent::Attach(dev.clone()));
        let mut channel = core.open(DeviceId(0), AccessMode::RDWR).unwrap();

        core.handle_event(DiscoveryEvent::Detach(dev.bus_id()));
        assert!(matches!(core.open(DeviceId(0), AccessMode::RDWR), Err(PcdError::NotFound(_))));
        assert!(matches!(channel.seek(Whence::Set, 0), Err(PcdError::NotFound(_))));
    }

    #[test]
    fn load_static_and_shutdown() {
        let core = PcdCore::new(10);
        let ids = core.load_static(StaticTable::four_devices()).unwrap();
        core.handle_event(DiscoveryEvent::Attach(platform("pcdev-C1x", 2, 16)));

        assert_eq!(ids.len(), 4);
        assert_eq!(core.attribute_paths().len(), 10);
        assert_eq!(core.shutdown(), 5);
        assert_eq!(core.device_count(), 0);
        assert_eq!(core.unload_static(), 0);
    }

    #[test]
    fn devices_snapshot() {
        let core = PcdCore::new(4);
        core.load_static(StaticTable::single()).unwrap();

        let devices = core.devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].group, "pcdev-0");
        assert_eq!(devices[0].capacity, 512);
        assert_eq!(devices[0].attributes["serial_num"], "PCD0000SINGLE");
        assert_eq!(devices[0].attributes["max_size"], "512");
    }
}
