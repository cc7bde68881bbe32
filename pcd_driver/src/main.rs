//! # PCD Driver Binary
//!
//! Loads the device configuration, registers the static table, replays the
//! configured bus announcements and keeps the devices alive until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (four-device static table) when the config file is missing
//! pcd_driver
//!
//! # Explicit config, verbose logging
//! pcd_driver --config config/pcd.toml -v
//!
//! # Print a JSON snapshot of every device and exit
//! pcd_driver --config config/pcd.toml --dump
//! ```

#![deny(warnings)]

use clap::Parser;
use pcd_common::config::{ConfigError, ConfigLoader, LogLevel};
use pcd_common::pcd::config::PcdConfig;
use pcd_common::pcd::consts::DEFAULT_CONFIG_PATH;
use pcd_driver::{BusDevice, DiscoveryBus, PcdCore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Handle used to apply the configured log level once the config is loaded.
type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// PCD Driver - pseudo character devices with pluggable discovery
#[derive(Parser, Debug)]
#[command(name = "pcd_driver")]
#[command(version)]
#[command(about = "Pseudo character device core with static, platform and device-tree discovery")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file (pcd.toml). Built-in defaults are used
    /// if it does not exist.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Print a JSON snapshot of all devices and exit
    #[arg(long)]
    dump: bool,

    /// Exit after discovery instead of waiting for Ctrl-C
    #[arg(long)]
    once: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("PCD driver failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = setup_tracing(&args);

    let (config, loaded) = load_config(&args.config)?;
    apply_log_level(&filter, &args, config.shared.log_level)?;

    info!("PCD driver v{} starting...", env!("CARGO_PKG_VERSION"));
    if loaded {
        info!("Loaded configuration from {:?}", args.config);
    } else {
        info!("No configuration at {:?}, using defaults", args.config);
    }
    config.validate()?;

    let core = PcdCore::from_config(&config)?;

    let bus = DiscoveryBus::new();
    for device in &config.platform_devices {
        bus.attach(BusDevice::Platform(device.clone()));
    }
    for node in &config.device_tree {
        bus.attach(BusDevice::Node(node.clone()));
    }
    for status in core.process(&bus) {
        if !status.is_ok() {
            warn!("Discovery event failed: {:?} (status {})", status, status.code());
        }
    }

    let devices = core.devices()?;
    for device in &devices {
        info!(
            "  Device {} [{}] {}: {} bytes, {}, serial {}",
            device.id,
            device.kind.as_str(),
            device.group,
            device.capacity,
            device.permission,
            device.serial
        );
    }
    info!("{} of {} device slots in use", devices.len(), core.max_devices());

    if args.dump {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else if !args.once {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let signal = core.signal().clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            signal.raise();
            flag.store(false, Ordering::SeqCst);
        })?;

        while running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
        }
    }

    let removed = core.shutdown();
    info!("PCD driver shutdown complete ({} devices removed)", removed);
    Ok(())
}

/// Load the config file, falling back to defaults if it is missing.
///
/// Returns the config and whether it came from the file.
fn load_config(path: &Path) -> Result<(PcdConfig, bool), ConfigError> {
    match PcdConfig::load(path) {
        Ok(config) => Ok((config, true)),
        Err(ConfigError::FileNotFound) => Ok((PcdConfig::default(), false)),
        Err(e) => Err(e),
    }
}

/// Setup tracing subscriber based on CLI arguments.
///
/// Logs go to stderr so `--dump` output stays parseable. The filter starts at
/// INFO (DEBUG with `-v`) and is replaced by [`apply_log_level`].
fn setup_tracing(args: &Args) -> FilterHandle {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let (filter, handle) = reload::Layer::new(build_filter(level));
    let registry = tracing_subscriber::registry().with(filter);

    if args.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
    handle
}

/// Switch the filter to the config file's log level unless `-v` was given.
fn apply_log_level(
    handle: &FilterHandle,
    args: &Args,
    log_level: LogLevel,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.verbose {
        return Ok(());
    }
    let level: Level = log_level.as_directive().parse()?;
    handle.reload(build_filter(level))?;
    Ok(())
}

fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}
