//! Per-open byte-stream session.
//!
//! An `IoChannel` is created by `PcdCore::open` and lives until it is closed
//! or dropped. Its offset is stored in the descriptor's channel table, under
//! the descriptor lock, so read, write, seek and `max_size` resizes are
//! serialized per device.

use crate::descriptor::DeviceDescriptor;
use crate::sync::Signal;
use pcd_common::pcd::error::PcdError;
use pcd_common::pcd::types::{AccessMode, ChannelId, DeviceId, Whence};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Open session on one device.
#[derive(Debug)]
pub struct IoChannel {
    device_id: DeviceId,
    channel_id: ChannelId,
    mode: AccessMode,
    descriptor: Weak<DeviceDescriptor>,
    signal: Signal,
}

impl IoChannel {
    /// Open a channel on `descriptor`.
    ///
    /// # Errors
    /// - `PcdError::PermissionDenied` if the variant refuses `mode`
    /// - `PcdError::Interrupted` if `signal` ends the lock wait
    pub(crate) fn open(
        descriptor: &Arc<DeviceDescriptor>,
        mode: AccessMode,
        signal: Signal,
    ) -> Result<Self, PcdError> {
        let device_id = descriptor.id();
        if let Err(err) = descriptor.ops().open(descriptor.permission(), mode) {
            warn!(
                "Open of device {} with {:?} refused ({}): {}",
                device_id,
                mode,
                descriptor.permission(),
                err
            );
            return Err(err);
        }

        let channel_id = descriptor.lock(&signal)?.open_channel(mode);
        debug!("open was successful (device {}, channel {})", device_id, channel_id.0);

        Ok(Self {
            device_id,
            channel_id,
            mode,
            descriptor: Arc::downgrade(descriptor),
            signal,
        })
    }

    fn descriptor(&self) -> Result<Arc<DeviceDescriptor>, PcdError> {
        self.descriptor
            .upgrade()
            .ok_or_else(|| PcdError::no_device(self.device_id))
    }

    fn require(&self, needed: AccessMode) -> Result<(), PcdError> {
        if self.mode.contains(needed) {
            Ok(())
        } else {
            Err(PcdError::PermissionDenied)
        }
    }

    fn missing_channel(&self) -> PcdError {
        PcdError::NotFound(format!("channel {}", self.channel_id.0))
    }

    /// Device this channel was opened on.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Mode the channel was opened with.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Current offset.
    ///
    /// # Errors
    /// `PcdError::NotFound` once the device is gone.
    pub fn offset(&self) -> Result<u32, PcdError> {
        let descriptor = self.descriptor()?;
        let state = descriptor.lock(&self.signal)?;
        state
            .channel(self.channel_id)
            .map(|c| c.offset)
            .ok_or_else(|| self.missing_channel())
    }

    /// Read up to `buf.len()` bytes at the current offset.
    ///
    /// Returns `0` at end of device.
    ///
    /// # Errors
    /// - `PcdError::PermissionDenied` if the channel was not opened for reading
    /// - `PcdError::Interrupted` if the signal ends the lock wait
    /// - `PcdError::NotFound` once the device is gone
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, PcdError> {
        self.require(AccessMode::READ)?;
        let descriptor = self.descriptor()?;
        let mut state = descriptor.lock(&self.signal)?;
        let offset = state
            .channel(self.channel_id)
            .ok_or_else(|| self.missing_channel())?
            .offset;

        debug!("read requested for {} bytes", buf.len());
        debug!("current file position = {}", offset);

        let count = descriptor.ops().read(state.buffer(), offset, buf)?;
        let updated = offset + count as u32;
        state.set_offset(self.channel_id, updated)?;

        debug!("Number of bytes successfully read = {}", count);
        debug!("updated file position = {}", updated);
        Ok(count)
    }

    /// Write as much of `data` as fits at the current offset.
    ///
    /// # Errors
    /// - `PcdError::NoSpace` if the offset is at capacity; nothing is written
    /// - `PcdError::PermissionDenied` if the channel was not opened for writing
    /// - `PcdError::Interrupted` if the signal ends the lock wait
    /// - `PcdError::NotFound` once the device is gone
    pub fn write(&mut self, data: &[u8]) -> Result<usize, PcdError> {
        self.require(AccessMode::WRITE)?;
        let descriptor = self.descriptor()?;
        let mut state = descriptor.lock(&self.signal)?;
        let offset = state
            .channel(self.channel_id)
            .ok_or_else(|| self.missing_channel())?
            .offset;

        debug!("write requested for {} bytes", data.len());
        debug!("current file position = {}", offset);

        let count = descriptor.ops().write(state.buffer_mut(), offset, data)?;
        let updated = offset + count as u32;
        state.set_offset(self.channel_id, updated)?;

        debug!("Number of bytes successfully written = {}", count);
        debug!("updated file position = {}", updated);
        Ok(count)
    }

    /// Move the offset and return the new value.
    ///
    /// # Errors
    /// - `PcdError::OutOfRange` if the target is outside `[0, capacity]`;
    ///   the offset is unchanged
    /// - `PcdError::Interrupted` if the signal ends the lock wait
    /// - `PcdError::NotFound` once the device is gone
    pub fn seek(&mut self, whence: Whence, delta: i64) -> Result<u32, PcdError> {
        let descriptor = self.descriptor()?;
        let mut state = descriptor.lock(&self.signal)?;
        let offset = state
            .channel(self.channel_id)
            .ok_or_else(|| self.missing_channel())?
            .offset;

        debug!("current value of the file position = {}", offset);
        let updated = descriptor
            .ops()
            .llseek(state.capacity(), offset, whence, delta)?;
        state.set_offset(self.channel_id, updated)?;
        debug!("New value of the file position = {}", updated);
        Ok(updated)
    }

    /// Close the channel. Equivalent to dropping it.
    pub fn close(self) {}
}

impl Drop for IoChannel {
    fn drop(&mut self) {
        if let Some(descriptor) = self.descriptor.upgrade() {
            descriptor.lock_uninterruptible().close_channel(self.channel_id);
        }
        debug!("release was successful (device {})", self.device_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::pcdev::StaticDeviceOps;
    use pcd_common::pcd::config::DeviceConfiguration;
    use pcd_common::pcd::types::Permission;

    fn descriptor(capacity: u32, permission: Permission) -> Arc<DeviceDescriptor> {
        Arc::new(
            DeviceDescriptor::new(
                DeviceId(0),
                DeviceConfiguration::new(capacity, permission, "CH0"),
                Box::new(StaticDeviceOps),
            )
            .unwrap(),
        )
    }

    #[test]
    fn write_then_read_back() {
        let desc = descriptor(8, Permission::ReadWrite);
        let mut ch = IoChannel::open(&desc, AccessMode::RDWR, Signal::new()).unwrap();

        assert_eq!(ch.write(b"hello world"), Ok(8));
        assert_eq!(ch.offset(), Ok(8));
        assert_eq!(ch.write(b"!"), Err(PcdError::NoSpace));

        assert_eq!(ch.seek(Whence::Set, 0), Ok(0));
        let mut out = [0u8; 16];
        assert_eq!(ch.read(&mut out), Ok(8));
        assert_eq!(&out[..8], b"hello wo");
        assert_eq!(ch.read(&mut out), Ok(0));
    }

    #[test]
    fn seek_cur_adds_once() {
        let desc = descriptor(100, Permission::ReadWrite);
        let mut ch = IoChannel::open(&desc, AccessMode::RDONLY, Signal::new()).unwrap();

        assert_eq!(ch.seek(Whence::Set, 10), Ok(10));
        assert_eq!(ch.seek(Whence::Cur, 5), Ok(15));
        assert_eq!(ch.seek(Whence::Cur, -15), Ok(0));
        assert_eq!(ch.seek(Whence::End, 0), Ok(100));
        assert_eq!(ch.seek(Whence::End, 1), Err(PcdError::OutOfRange));
        assert_eq!(ch.offset(), Ok(100));
    }

    #[test]
    fn mode_gates_read_and_write() {
        let desc = descriptor(4, Permission::ReadWrite);
        let mut reader = IoChannel::open(&desc, AccessMode::RDONLY, Signal::new()).unwrap();
        assert_eq!(reader.write(b"x"), Err(PcdError::PermissionDenied));

        let mut writer = IoChannel::open(&desc, AccessMode::WRONLY, Signal::new()).unwrap();
        let mut out = [0u8; 1];
        assert_eq!(writer.read(&mut out), Err(PcdError::PermissionDenied));
        assert_eq!(writer.write(b"x"), Ok(1));
    }

    #[test]
    fn open_denied_creates_no_channel() {
        let desc = descriptor(4, Permission::ReadOnly);
        let result = IoChannel::open(&desc, AccessMode::RDWR, Signal::new());
        assert!(matches!(result, Err(PcdError::PermissionDenied)));
        assert_eq!(desc.lock_uninterruptible().open_channels(), 0);
    }

    #[test]
    fn drop_releases_channel_entry() {
        let desc = descriptor(4, Permission::ReadWrite);
        let a = IoChannel::open(&desc, AccessMode::RDWR, Signal::new()).unwrap();
        let b = IoChannel::open(&desc, AccessMode::RDWR, Signal::new()).unwrap();
        assert_eq!(desc.lock_uninterruptible().open_channels(), 2);

        a.close();
        drop(b);
        assert_eq!(desc.lock_uninterruptible().open_channels(), 0);
    }

    #[test]
    fn removed_device_is_not_found() {
        let desc = descriptor(4, Permission::ReadWrite);
        let mut ch = IoChannel::open(&desc, AccessMode::RDWR, Signal::new()).unwrap();
        drop(desc);

        assert!(matches!(ch.write(b"x"), Err(PcdError::NotFound(_))));
        assert!(matches!(ch.seek(Whence::Set, 0), Err(PcdError::NotFound(_))));
    }
}
