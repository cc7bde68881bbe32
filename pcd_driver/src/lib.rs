//! # PCD Driver Library
//!
//! Pseudo character device core with pluggable discovery.
//!
//! This crate provides the device lifecycle manager, the bounded per-device
//! I/O state machine and the attribute surface. Device variants implement the
//! `FileOperations` trait defined in `pcd_common::pcd::ops`.
//!
//! # Module Structure
//!
//! - [`core`] - PcdCore struct, discovery event handling, open/attribute entry points
//! - [`registry`] - Id-indexed descriptor arena
//! - [`descriptor`] - Per-device buffer, channel table and lock
//! - [`channel`] - Per-open byte-stream session
//! - [`attribute`] - Named attribute endpoints
//! - [`discovery`] - Static table, platform and device-tree matching
//! - [`drivers`] - Operation variants and the simulated GPIO controller
//! - [`sync`] - Interruptible device lock
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     pcd_driver (single crate)                    │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │  Discovery  │───►│   PcdCore    │◄──►│  DeviceRegistry     │  │
//! │  │  events     │    │              │    │  (id → descriptor)  │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │                                     │
//! │                 ┌──────────┴──────────┐                          │
//! │                 ▼                     ▼                          │
//! │        ┌────────────────┐    ┌────────────────┐                  │
//! │        │   IoChannel    │    │ AttributeBridge│                  │
//! │        └────────────────┘    └────────────────┘                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod attribute;
pub mod channel;
pub mod core;
pub mod descriptor;
pub mod discovery;
pub mod drivers;
pub mod registry;
pub mod sync;

// Re-export key types for convenience
pub use crate::attribute::AttributeBridge;
pub use crate::channel::IoChannel;
pub use crate::core::{DeviceInfo, PcdCore};
pub use crate::descriptor::DeviceDescriptor;
pub use crate::discovery::{BusDevice, BusDeviceId, DiscoveryBus, DiscoveryEvent, ProbeStatus};
pub use crate::registry::DeviceRegistry;
pub use crate::sync::Signal;
