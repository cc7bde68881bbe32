//! PCD constants.
//!
//! Device limits, raw permission encodings, match tables and the names of
//! the device-tree properties and attributes used by the device core.

/// Canonical service name (used for logging).
pub const PCD_SERVICE_NAME: &str = "pcd";

/// Default maximum number of registered devices.
pub const MAX_DEVICES: usize = 10;

/// Upper bound for a configured `max_devices` (size of the minor number space).
pub const DEVICE_ID_LIMIT: usize = 256;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pcd/pcd.toml";

/// Raw permission value: read only.
pub const RDONLY: u32 = 0x01;

/// Raw permission value: write only.
pub const WRONLY: u32 = 0x10;

/// Raw permission value: read and write.
pub const RDWR: u32 = 0x11;

/// Raw whence value for an absolute seek.
pub const SEEK_SET: i32 = 0;

/// Raw whence value for a seek relative to the current offset.
pub const SEEK_CUR: i32 = 1;

/// Raw whence value for a seek relative to the device capacity.
pub const SEEK_END: i32 = 2;

/// Platform driver name matched against bus device names.
pub const PLATFORM_DRIVER_NAME: &str = "pseudo-char-device";

/// Platform id table / device-tree compatible names, indexed by driver data slot.
pub const PCDEV_NAMES: [&str; 4] = ["pcdev-A1x", "pcdev-B1x", "pcdev-C1x", "pcdev-D1x"];

/// Driver-specific integers `(config_item1, config_item2)` per id table slot.
pub const PCDEV_DRIVER_DATA: [(i32, i32); 4] = [(60, 21), (50, 22), (40, 23), (30, 24)];

/// Device-tree compatible of the GPIO sysfs node.
pub const GPIO_SYSFS_COMPATIBLE: &str = "org,bone-gpio-sysfs";

/// Vendor prefix accepted in front of compatible and property names.
pub const VENDOR_PREFIX: &str = "org,";

/// Device-tree property: serial number string.
pub const PROP_SERIAL: &str = "device-serial-num";

/// Device-tree property: capacity in bytes.
pub const PROP_SIZE: &str = "size";

/// Device-tree property: raw permission.
pub const PROP_PERM: &str = "perm";

/// Device-tree property (GPIO child): line label.
pub const PROP_LABEL: &str = "label";

/// Device-tree property (GPIO child): line number on the controller.
pub const PROP_GPIO: &str = "gpio";

/// Group name prefix of pcdev attribute namespaces (`pcdev-<id>`).
pub const DEVICE_NAME_PREFIX: &str = "pcdev";

/// Maximum GPIO label length in bytes, not counting a terminating NUL.
pub const GPIO_LABEL_MAX: usize = 19;
