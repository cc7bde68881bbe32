//! Pseudo character device model.
//!
//! This module contains the types, constants and traits shared by the
//! device core and its discovery sources.

pub mod config;
pub mod consts;
pub mod error;
pub mod gpio;
pub mod ops;
pub mod permission;
pub mod types;
