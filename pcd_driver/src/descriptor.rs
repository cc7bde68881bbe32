//! Device descriptor.
//!
//! A `DeviceDescriptor` owns one device's buffer, its open-channel table and
//! the exclusive lock guarding both. Capacity is the buffer length, so the
//! `buffer.len() == capacity` invariant holds by construction.

use crate::sync::{DeviceGuard, DeviceLock, Signal};
use pcd_common::pcd::config::DeviceConfiguration;
use pcd_common::pcd::consts::DEVICE_NAME_PREFIX;
use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::gpio::GpioLine;
use pcd_common::pcd::ops::FileOperations;
use pcd_common::pcd::types::{AccessMode, ChannelId, DeviceId, DeviceKind, Permission};
use std::collections::HashMap;
use tracing::debug;

/// Allocate a zero-filled buffer without aborting on allocation failure.
pub(crate) fn allocate_buffer(capacity: u32) -> Result<Vec<u8>, PcdError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(capacity as usize)
        .map_err(|_| PcdError::OutOfMemory(capacity))?;
    buffer.resize(capacity as usize, 0);
    Ok(buffer)
}

/// Cursor of one open channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelEntry {
    /// Current offset, `0 <= offset <= capacity`.
    pub offset: u32,
    /// Mode the channel was opened with.
    pub mode: AccessMode,
}

/// Lock-protected part of a descriptor.
pub struct DeviceState {
    buffer: Vec<u8>,
    channels: HashMap<ChannelId, ChannelEntry>,
    next_channel: u64,
    gpio: Option<Box<dyn GpioLine>>,
}

impl DeviceState {
    fn new(buffer: Vec<u8>, gpio: Option<Box<dyn GpioLine>>) -> Self {
        Self {
            buffer,
            channels: HashMap::new(),
            next_channel: 0,
            gpio,
        }
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> u32 {
        self.buffer.len() as u32
    }

    /// Device contents.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Mutable device contents.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Number of live channels.
    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }

    /// Cursor of channel `id`.
    pub fn channel(&self, id: ChannelId) -> Option<ChannelEntry> {
        self.channels.get(&id).copied()
    }

    pub(crate) fn open_channel(&mut self, mode: AccessMode) -> ChannelId {
        let id = ChannelId(self.next_channel);
        self.next_channel += 1;
        self.channels.insert(id, ChannelEntry { offset: 0, mode });
        id
    }

    pub(crate) fn close_channel(&mut self, id: ChannelId) -> bool {
        self.channels.remove(&id).is_some()
    }

    pub(crate) fn set_offset(&mut self, id: ChannelId, offset: u32) -> Result<(), PcdError> {
        let entry = self
            .channels
            .get_mut(&id)
            .ok_or_else(|| PcdError::NotFound(format!("channel {}", id.0)))?;
        entry.offset = offset;
        Ok(())
    }

    /// Resize the buffer, keeping bytes up to `min(old, new)`.
    ///
    /// # Errors
    /// - `PcdError::Busy` if a live channel's offset is beyond `new_capacity`
    /// - `PcdError::OutOfMemory` if growing fails; the buffer is unchanged
    pub fn resize(&mut self, new_capacity: u32) -> Result<(), PcdError> {
        if self.channels.values().any(|c| c.offset > new_capacity) {
            return Err(PcdError::Busy);
        }

        let new_len = new_capacity as usize;
        if new_len > self.buffer.len() {
            self.buffer
                .try_reserve_exact(new_len - self.buffer.len())
                .map_err(|_| PcdError::OutOfMemory(new_capacity))?;
            self.buffer.resize(new_len, 0);
        } else {
            self.buffer.truncate(new_len);
            self.buffer.shrink_to_fit();
        }
        Ok(())
    }

    /// GPIO line of a GPIO-flavoured descriptor.
    pub fn gpio(&self) -> Option<&dyn GpioLine> {
        self.gpio.as_deref()
    }

    /// Mutable GPIO line of a GPIO-flavoured descriptor.
    pub fn gpio_mut(&mut self) -> Option<&mut (dyn GpioLine + 'static)> {
        self.gpio.as_deref_mut()
    }
}

/// Per-device state record owned by the registry.
pub struct DeviceDescriptor {
    id: DeviceId,
    configuration: DeviceConfiguration,
    ops: Box<dyn FileOperations>,
    label: Option<String>,
    state: DeviceLock<DeviceState>,
}

impl DeviceDescriptor {
    /// Build a descriptor with a zero-filled buffer of `configuration.capacity_bytes`.
    ///
    /// # Errors
    /// `PcdError::OutOfMemory` if the buffer cannot be allocated.
    pub(crate) fn new(
        id: DeviceId,
        configuration: DeviceConfiguration,
        ops: Box<dyn FileOperations>,
    ) -> Result<Self, PcdError> {
        let buffer = allocate_buffer(configuration.capacity_bytes)?;
        debug!(
            "Allocated {} byte buffer for device {} ({})",
            buffer.len(),
            id,
            configuration.serial_label
        );

        Ok(Self {
            id,
            configuration,
            ops,
            label: None,
            state: DeviceLock::new(DeviceState::new(buffer, None)),
        })
    }

    /// Build an attribute-only descriptor around a GPIO line.
    pub(crate) fn new_gpio(
        id: DeviceId,
        label: &str,
        line: Box<dyn GpioLine>,
        ops: Box<dyn FileOperations>,
    ) -> Self {
        Self {
            id,
            configuration: DeviceConfiguration::new(0, Permission::ReadWrite, label),
            ops,
            label: Some(label.to_string()),
            state: DeviceLock::new(DeviceState::new(Vec::new(), Some(line))),
        }
    }

    /// Registry id.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Configuration the device was registered with.
    ///
    /// `capacity_bytes` is the initial capacity; `max_size` writes change the
    /// live capacity only.
    pub fn configuration(&self) -> &DeviceConfiguration {
        &self.configuration
    }

    /// Declared permission.
    pub fn permission(&self) -> Permission {
        self.configuration.permission
    }

    /// Serial number label.
    pub fn serial_label(&self) -> &str {
        &self.configuration.serial_label
    }

    /// GPIO label, for GPIO-flavoured descriptors.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Operation variant.
    pub fn ops(&self) -> &dyn FileOperations {
        self.ops.as_ref()
    }

    /// Variant kind.
    pub fn kind(&self) -> DeviceKind {
        self.ops.kind()
    }

    /// Attribute namespace of this device (`pcdev-<id>` or the GPIO label).
    pub fn group_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{}-{}", DEVICE_NAME_PREFIX, self.id),
        }
    }

    /// Take the descriptor lock, interruptible by `signal`.
    pub fn lock(&self, signal: &Signal) -> Result<DeviceGuard<'_, DeviceState>, PcdError> {
        self.state.lock_interruptible(signal)
    }

    /// Take the descriptor lock on a path that must not fail.
    pub(crate) fn lock_uninterruptible(&self) -> DeviceGuard<'_, DeviceState> {
        self.state.lock()
    }
}
