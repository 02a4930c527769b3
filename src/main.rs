//! Shared Storage Admin CLI
//!
//! Command-line surface over the driver: list and mutate virtual devices,
//! targets and portals on the local host, and inspect the settings
//! document. Discovery output is JSON.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shared_storage_admin::{
    DeviceType, DriverFactory, LocalRunner, Portal, Result, SettingsStore, Target, VirtualDevice,
    DEFAULT_SETTINGS_PATH,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Shared Storage Admin - SMB/NFS/iSCSI administration for a single host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Driver backend
    #[arg(long, env = "DRIVER_BACKEND", default_value = "single-host")]
    backend: String,

    /// Path to the settings document
    #[arg(long, env = "SETTINGS_PATH", default_value = DEFAULT_SETTINGS_PATH)]
    settings_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List virtual devices
    Devices {
        /// Restrict to one device type (blockio, fileio)
        #[arg(long)]
        device_type: Option<DeviceType>,
    },
    /// Register a virtual device
    DeviceAdd {
        #[arg(long)]
        name: String,
        /// Backing file or block device
        #[arg(long)]
        path: String,
        #[arg(long, default_value = "512")]
        block_size: u64,
        #[arg(long, default_value = "blockio")]
        device_type: DeviceType,
    },
    /// Unregister a virtual device
    DeviceRemove {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "blockio")]
        device_type: DeviceType,
    },
    /// List targets with their portals
    Targets,
    /// Create a target
    TargetCreate { name: String },
    /// Remove a target
    TargetRemove { name: String },
    /// Allow a portal on a target
    PortalAdd {
        #[arg(long)]
        target: String,
        #[arg(long)]
        address: String,
    },
    /// Remove a portal from a target
    PortalRemove {
        #[arg(long)]
        target: String,
        #[arg(long)]
        address: String,
    },
    /// Show the effective settings document
    Settings,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let driver = DriverFactory::create(&args.backend, Arc::new(LocalRunner::new()))?;

    match args.command {
        Cmd::Devices { device_type } => {
            let devices = match device_type {
                Some(device_type) => driver.get_virtual_devices_of_type(device_type).await?,
                None => driver.get_virtual_devices().await?,
            };
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        Cmd::DeviceAdd {
            name,
            path,
            block_size,
            device_type,
        } => {
            let device = VirtualDevice::new(name, path, block_size, device_type);
            driver.add_virtual_device(&device).await?;
            info!("device {} added", device.device_name);
        }
        Cmd::DeviceRemove { name, device_type } => {
            // Only the name and handler matter for removal
            let device = VirtualDevice::new(name, "", 0, device_type);
            driver.remove_virtual_device(&device).await?;
            info!("device {} removed", device.device_name);
        }
        Cmd::Targets => {
            let targets = driver.get_targets().await?;
            println!("{}", serde_json::to_string_pretty(&targets)?);
        }
        Cmd::TargetCreate { name } => {
            driver.create_target(&Target::new(&name)).await?;
            info!("target {} created", name);
        }
        Cmd::TargetRemove { name } => {
            driver.remove_target(&Target::new(&name)).await?;
            info!("target {} removed", name);
        }
        Cmd::PortalAdd { target, address } => {
            driver
                .add_portal_to_target(&Target::new(&target), &Portal::new(&address))
                .await?;
            info!("portal {} allowed on {}", address, target);
        }
        Cmd::PortalRemove { target, address } => {
            driver
                .remove_portal_from_target(&Target::new(&target), &Portal::new(&address))
                .await?;
            info!("portal {} removed from {}", address, target);
        }
        Cmd::Settings => {
            let store = SettingsStore::load(&args.settings_path)?;
            println!("{}", serde_json::to_string_pretty(&store.get())?);
        }
    }

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
