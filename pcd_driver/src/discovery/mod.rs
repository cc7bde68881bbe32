//! Device discovery.
//!
//! This module defines:
//! - `BusDevice` / `BusDeviceId` - What a discovery bus announces
//! - `DiscoveryEvent` - Attach/detach message consumed by `PcdCore`
//! - `BusDriver` trait - Match, probe and remove against the registry
//! - `DiscoveryBus` - Channel-backed event queue
//!
//! Variants:
//! - [`static_table`] - Configurations registered eagerly at startup
//! - [`platform`] - Platform bus match by name or id table
//! - [`device_tree`] - Device-tree node match by compatible string

pub mod device_tree;
pub mod platform;
pub mod static_table;

pub use device_tree::DeviceTreeMatch;
pub use platform::PlatformMatch;
pub use static_table::StaticTable;

use crate::registry::DeviceRegistry;
use pcd_common::pcd::config::{DeviceNode, PlatformDevice};
use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::types::DeviceId;
use std::sync::mpsc::{self, Receiver, Sender};

/// Device announced by a discovery bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusDevice {
    /// Platform bus device with an optional configuration blob.
    Platform(PlatformDevice),
    /// Device-tree node.
    Node(DeviceNode),
}

impl BusDevice {
    /// Identity used to detach this device later.
    pub fn bus_id(&self) -> BusDeviceId {
        match self {
            Self::Platform(device) => BusDeviceId::Platform(device.bus_name()),
            Self::Node(node) => BusDeviceId::Node(node.path.clone()),
        }
    }
}

/// Identity of an announced device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BusDeviceId {
    /// Platform bus name (`name.id`).
    Platform(String),
    /// Device-tree node path.
    Node(String),
}

/// Message from a discovery bus.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    /// A device appeared.
    Attach(BusDevice),
    /// A device went away.
    Detach(BusDeviceId),
}

/// Outcome of handling one [`DiscoveryEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Probe registered these devices.
    Bound(Vec<DeviceId>),
    /// Remove unregistered this many devices.
    Removed(usize),
    /// No bus driver matched the device.
    NoMatch,
    /// Probe failed; nothing was registered.
    Failed(PcdError),
}

impl ProbeStatus {
    /// Status code reported back to the bus (`0` or a negative errno).
    pub fn code(&self) -> i32 {
        match self {
            Self::Bound(_) | Self::Removed(_) => 0,
            Self::NoMatch => -libc::ENODEV,
            Self::Failed(err) => err.errno(),
        }
    }

    /// Whether the bus sees a successful status.
    pub fn is_ok(&self) -> bool {
        self.code() == 0
    }
}

/// Bus-side driver binding announced devices to registry entries.
pub trait BusDriver: Send {
    /// Driver name for logging.
    fn name(&self) -> &'static str;

    /// Whether this driver handles `device`.
    fn matches(&self, device: &BusDevice) -> bool;

    /// Register the devices described by `device`.
    ///
    /// Either every device is registered or none is.
    fn probe(
        &mut self,
        registry: &mut DeviceRegistry,
        device: &BusDevice,
    ) -> Result<Vec<DeviceId>, PcdError>;

    /// Unregister the devices bound to `id`. Returns how many were removed;
    /// an unknown id removes nothing.
    fn remove(&mut self, registry: &mut DeviceRegistry, id: &BusDeviceId) -> usize;

    /// Unregister every device this driver bound.
    fn remove_all(&mut self, registry: &mut DeviceRegistry) -> usize;
}

/// Queue of discovery events.
///
/// Producers hold a [`Sender`] from [`DiscoveryBus::sender`]; `PcdCore`
/// drains the queue with [`PcdCore::process`](crate::core::PcdCore::process).
#[derive(Debug)]
pub struct DiscoveryBus {
    sender: Sender<DiscoveryEvent>,
    receiver: Receiver<DiscoveryEvent>,
}

impl DiscoveryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// Producer handle.
    pub fn sender(&self) -> Sender<DiscoveryEvent> {
        self.sender.clone()
    }

    /// Queue an attach event.
    pub fn attach(&self, device: BusDevice) {
        // The receiver lives in `self`, so sending cannot fail.
        let _ = self.sender.send(DiscoveryEvent::Attach(device));
    }

    /// Queue a detach event.
    pub fn detach(&self, id: BusDeviceId) {
        let _ = self.sender.send(DiscoveryEvent::Detach(id));
    }

    /// Take every queued event without blocking.
    pub fn drain(&self) -> Vec<DiscoveryEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Default for DiscoveryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcd_common::pcd::config::DeviceConfiguration;
    use pcd_common::pcd::types::Permission;

    #[test]
    fn bus_ids() {
        let blob = DeviceConfiguration::new(16, Permission::ReadWrite, "X");
        let dev = BusDevice::Platform(PlatformDevice::new("pcdev-A1x", 0, blob));
        assert_eq!(dev.bus_id(), BusDeviceId::Platform("pcdev-A1x.0".into()));

        let node = BusDevice::Node(DeviceNode::new("/pcdev-1", "org,pcdev-A1x"));
        assert_eq!(node.bus_id(), BusDeviceId::Node("/pcdev-1".into()));
    }

    #[test]
    fn status_codes() {
        assert_eq!(ProbeStatus::Bound(vec![DeviceId(0)]).code(), 0);
        assert_eq!(ProbeStatus::Removed(0).code(), 0);
        assert_eq!(ProbeStatus::NoMatch.code(), -libc::ENODEV);
        assert_eq!(
            ProbeStatus::Failed(PcdError::MissingProperty("size".into())).code(),
            -libc::EINVAL
        );
    }

    #[test]
    fn bus_queues_events_in_order() {
        let bus = DiscoveryBus::new();
        let sender = bus.sender();
        bus.detach(BusDeviceId::Node("/a".into()));
        sender
            .send(DiscoveryEvent::Detach(BusDeviceId::Node("/b".into())))
            .unwrap();

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            DiscoveryEvent::Detach(BusDeviceId::Node("/b".into()))
        );
        assert!(bus.drain().is_empty());
    }
}
