//! PCD configuration types.
//!
//! This module contains the three discovery configuration forms and the
//! application config loaded from `pcd.toml`:
//! - `DeviceConfiguration` - Static table entry / platform data blob
//! - `PlatformDevice` - Platform bus announcement
//! - `DeviceNode` / `PropertyValue` - Device-tree node with named properties
//! - `PcdConfig` - Main configuration file

use crate::config::{ConfigError, SharedConfig};
use crate::pcd::consts::{DEVICE_ID_LIMIT, MAX_DEVICES, VENDOR_PREFIX};
use crate::pcd::error::PcdError;
use crate::pcd::types::Permission;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default function for max_devices
fn default_max_devices() -> usize {
    MAX_DEVICES
}

/// Default number of simulated GPIO lines
fn default_gpio_lines() -> u32 {
    32
}

/// Driver-specific integers attached by an id table match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverData {
    /// First driver-specific value.
    pub config_item1: i32,
    /// Second driver-specific value.
    pub config_item2: i32,
}

/// Configuration of one pseudo device.
///
/// Serialized with the bus field names `size`, `perm` and `serial`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    /// Device capacity in bytes.
    #[serde(rename = "size")]
    pub capacity_bytes: u32,

    /// Declared access permission.
    #[serde(rename = "perm")]
    pub permission: Permission,

    /// Serial number label.
    #[serde(rename = "serial")]
    pub serial_label: String,

    /// Driver data selected by the matching id table entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_data: Option<DriverData>,
}

impl DeviceConfiguration {
    /// Create a configuration without driver data.
    pub fn new(capacity_bytes: u32, permission: Permission, serial_label: impl Into<String>) -> Self {
        Self {
            capacity_bytes,
            permission,
            serial_label: serial_label.into(),
            driver_data: None,
        }
    }

    /// Attach driver-specific integers.
    pub fn with_driver_data(mut self, driver_data: DriverData) -> Self {
        self.driver_data = Some(driver_data);
        self
    }
}

/// Device announced on the platform bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDevice {
    /// Device name matched against the driver name and id table.
    pub name: String,

    /// Bus instance id (`-1` for a single anonymous instance).
    #[serde(default)]
    pub id: i32,

    /// Bus-supplied configuration blob.
    #[serde(default)]
    pub platform_data: Option<DeviceConfiguration>,
}

impl PlatformDevice {
    /// Create an announcement carrying `platform_data`.
    pub fn new(name: impl Into<String>, id: i32, platform_data: DeviceConfiguration) -> Self {
        Self {
            name: name.into(),
            id,
            platform_data: Some(platform_data),
        }
    }

    /// Bus-unique device name (`name.id`).
    pub fn bus_name(&self) -> String {
        if self.id < 0 {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.id)
        }
    }
}

/// Value of a device-tree property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// 32-bit cell.
    U32(u32),
    /// String property.
    Str(String),
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::U32(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Hierarchical device-tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNode {
    /// Full node path (e.g. `/pcdev1`).
    pub path: String,

    /// Compatible string matched against the driver match table.
    #[serde(default)]
    pub compatible: String,

    /// Named properties.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,

    /// Child nodes.
    #[serde(default)]
    pub children: Vec<DeviceNode>,
}

impl DeviceNode {
    /// Create a node without properties.
    pub fn new(path: impl Into<String>, compatible: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            compatible: compatible.into(),
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder: add a property.
    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Builder: add a child node.
    pub fn with_child(mut self, child: DeviceNode) -> Self {
        self.children.push(child);
        self
    }

    /// Last path component.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(self.path.as_str())
    }

    /// Whether the compatible string equals `name`, with or without vendor prefix.
    pub fn is_compatible(&self, name: &str) -> bool {
        let own = self
            .compatible
            .strip_prefix(VENDOR_PREFIX)
            .unwrap_or(self.compatible.as_str());
        let other = name.strip_prefix(VENDOR_PREFIX).unwrap_or(name);
        own == other
    }

    /// Property by name, falling back to the vendor-prefixed form.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .get(name)
            .or_else(|| self.properties.get(&format!("{VENDOR_PREFIX}{name}")))
    }

    /// Read a string property.
    ///
    /// # Errors
    /// `MissingProperty` if absent, `InvalidProperty` if not a string.
    pub fn read_string(&self, name: &str) -> Result<&str, PcdError> {
        match self.property(name) {
            Some(PropertyValue::Str(value)) => Ok(value.as_str()),
            Some(PropertyValue::U32(_)) => Err(PcdError::InvalidProperty(name.to_string())),
            None => Err(PcdError::MissingProperty(name.to_string())),
        }
    }

    /// Read a u32 property.
    ///
    /// # Errors
    /// `MissingProperty` if absent, `InvalidProperty` if not a cell.
    pub fn read_u32(&self, name: &str) -> Result<u32, PcdError> {
        match self.property(name) {
            Some(PropertyValue::U32(value)) => Ok(*value),
            Some(PropertyValue::Str(_)) => Err(PcdError::InvalidProperty(name.to_string())),
            None => Err(PcdError::MissingProperty(name.to_string())),
        }
    }
}

/// Built-in static table registered at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticTableKind {
    /// No static devices.
    None,
    /// One 512-byte read/write device.
    Single,
    /// Four devices with mixed permissions.
    #[default]
    FourDevices,
    /// Table taken from `static_devices`.
    Custom,
}

/// Main configuration loaded from `pcd.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PcdConfig {
    /// Shared logging / identity section.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Maximum number of registered devices.
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,

    /// Static table registered eagerly at startup.
    #[serde(default)]
    pub static_table: StaticTableKind,

    /// Entries of the custom static table.
    #[serde(default)]
    pub static_devices: Vec<DeviceConfiguration>,

    /// Platform devices announced after startup.
    #[serde(default)]
    pub platform_devices: Vec<PlatformDevice>,

    /// Device-tree nodes announced after startup.
    #[serde(default)]
    pub device_tree: Vec<DeviceNode>,

    /// Number of lines on the simulated GPIO controller.
    #[serde(default = "default_gpio_lines")]
    pub gpio_lines: u32,
}

impl Default for PcdConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            max_devices: default_max_devices(),
            static_table: StaticTableKind::default(),
            static_devices: Vec::new(),
            platform_devices: Vec::new(),
            device_tree: Vec::new(),
            gpio_lines: default_gpio_lines(),
        }
    }
}

impl PcdConfig {
    /// Validate the configuration.
    ///
    /// # Validation Rules
    /// 1. `shared` section valid
    /// 2. `1 <= max_devices <= DEVICE_ID_LIMIT`
    /// 3. `static_devices` only with `static_table = "custom"`, and not empty then
    /// 4. custom table fits in `max_devices`
    /// 5. every serial label non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.max_devices == 0 || self.max_devices > DEVICE_ID_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "max_devices must be in 1..={DEVICE_ID_LIMIT}, got {}",
                self.max_devices
            )));
        }

        match self.static_table {
            StaticTableKind::Custom => {
                if self.static_devices.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "static_table = \"custom\" requires static_devices".to_string(),
                    ));
                }
                if self.static_devices.len() > self.max_devices {
                    return Err(ConfigError::ValidationError(format!(
                        "Too many static devices: {} (max {})",
                        self.static_devices.len(),
                        self.max_devices
                    )));
                }
            }
            _ if !self.static_devices.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "static_devices requires static_table = \"custom\"".to_string(),
                ));
            }
            _ => {}
        }

        let blobs = self
            .static_devices
            .iter()
            .chain(self.platform_devices.iter().filter_map(|d| d.platform_data.as_ref()));
        for config in blobs {
            if config.serial_label.is_empty() {
                return Err(ConfigError::ValidationError(
                    "serial label cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
