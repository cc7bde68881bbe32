//! PCD Common Library
//!
//! This crate provides the shared device model, constants and configuration
//! loading utilities for all PCD workspace crates.
//!
//! # Module Structure
//!
//! - [`pcd`] - Pseudo character device types, errors and driver traits
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use pcd_common::prelude::*;
//!
//! let config = DeviceConfiguration::new(512, Permission::ReadWrite, "pcdevabc2023");
//! assert_eq!(config.capacity_bytes, 512);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod pcd;
pub mod prelude;
