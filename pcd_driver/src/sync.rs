//! Interruptible device lock.
//!
//! `DeviceLock` is a mutex whose acquisition can be abandoned when the
//! caller's [`Signal`] is raised. Waiters block in timed slices of at most
//! `WAIT_SLICE` and re-check the signal between slices.

use parking_lot::{Mutex, MutexGuard};
use pcd_common::pcd::error::PcdError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Upper bound between two checks of the caller's signal while waiting.
const WAIT_SLICE: Duration = Duration::from_millis(5);

/// Cancellation flag carried by a caller.
///
/// Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct Signal(Arc<AtomicBool>);

impl Signal {
    /// Create a signal that is not raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal; pending and future contended lock waits fail.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previously raised signal.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether the signal is raised.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// RAII guard of a [`DeviceLock`].
pub type DeviceGuard<'a, T> = MutexGuard<'a, T>;

/// Exclusive lock around one descriptor's mutable state.
#[derive(Debug)]
pub struct DeviceLock<T> {
    data: Mutex<T>,
}

impl<T> DeviceLock<T> {
    /// Wrap `value`.
    pub fn new(value: T) -> Self {
        Self {
            data: Mutex::new(value),
        }
    }

    /// Acquire the lock, giving up if `signal` is raised while waiting.
    ///
    /// An uncontended lock is acquired even when the signal is raised.
    ///
    /// # Errors
    /// `PcdError::Interrupted` if the signal ends the wait.
    pub fn lock_interruptible(&self, signal: &Signal) -> Result<DeviceGuard<'_, T>, PcdError> {
        if let Some(guard) = self.data.try_lock() {
            return Ok(guard);
        }
        loop {
            if signal.is_raised() {
                return Err(PcdError::Interrupted);
            }
            if let Some(guard) = self.data.try_lock_for(WAIT_SLICE) {
                return Ok(guard);
            }
        }
    }

    /// Acquire the lock without observing any signal.
    ///
    /// Used on release paths that must not fail.
    pub fn lock(&self) -> DeviceGuard<'_, T> {
        self.data.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn uncontended_lock_ignores_signal() {
        let lock = DeviceLock::new(5u32);
        let signal = Signal::new();
        signal.raise();
        let guard = lock.lock_interruptible(&signal).unwrap();
        assert_eq!(*guard, 5);
    }

    #[test]
    fn contended_wait_is_interrupted() {
        let lock = Arc::new(DeviceLock::new(0u32));
        let signal = Signal::new();
        let held = lock.lock();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let lock = Arc::clone(&lock);
            let signal = signal.clone();
            thread::spawn(move || {
                tx.send(()).unwrap();
                lock.lock_interruptible(&signal).map(|g| *g)
            })
        };

        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));
        signal.raise();

        assert_eq!(waiter.join().unwrap(), Err(PcdError::Interrupted));
        drop(held);
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let lock = Arc::new(DeviceLock::new(0u32));
        let mut held = lock.lock();

        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let mut guard = lock.lock_interruptible(&Signal::new()).unwrap();
                *guard += 1;
                *guard
            })
        };

        thread::sleep(Duration::from_millis(10));
        *held = 41;
        drop(held);

        assert_eq!(waiter.join().unwrap(), 42);
    }

    #[test]
    fn signal_clear() {
        let signal = Signal::new();
        let shared = signal.clone();
        shared.raise();
        assert!(signal.is_raised());
        signal.clear();
        assert!(!shared.is_raised());
    }

    #[test]
    fn raised_signal_before_wait_fails_fast() {
        let lock = DeviceLock::new(());
        let signal = Signal::new();
        signal.raise();
        let _held = lock.lock();

        thread::scope(|s| {
            let waiter = s.spawn(|| lock.lock_interruptible(&signal).map(|_| ()));
            assert_eq!(waiter.join().unwrap(), Err(PcdError::Interrupted));
        });
    }
}
