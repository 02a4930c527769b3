//! Shared Storage Admin - declarative administration for SMB/NFS/iSCSI
//!
//! Reconciles a declarative description of shared-storage resources with
//! the imperative control surfaces implementing them on a host: flat
//! config files for the file protocols, and an SCST-style control
//! pseudo-filesystem for iSCSI.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Caller / CLI / UI                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────┐   ┌────────────────────────────────┐ │
//! │  │  Config Diff       │   │  IscsiDriver (capability port) │ │
//! │  │  Engine            │   │        SingleHostDriver        │ │
//! │  └────────────────────┘   └───────────────┬────────────────┘ │
//! │                                           │                  │
//! │                           ┌───────────────┴────────────────┐ │
//! │                           │  CommandRunner (executor port) │ │
//! │                           │          LocalRunner           │ │
//! │                           └───────────────┬────────────────┘ │
//! └───────────────────────────────────────────┼──────────────────┘
//!                                             │
//!                       /sys/kernel/scst_tgt/{handlers,targets}/...
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Entity model and the driver/executor trait seams
//! - [`driver`]: Driver backends (single-host reference implementation)
//! - [`exec`]: Local command runner
//! - [`conf`]: Config diff engine and advanced-settings helpers
//! - [`settings`]: File-backed user settings store
//! - [`error`]: Error types and failure classification

pub mod conf;
pub mod domain;
pub mod driver;
pub mod error;
pub mod exec;
pub mod settings;

// Re-export commonly used types
pub use conf::{
    generate_conf_diff, join_advanced_settings, split_advanced_settings, str_to_bool, ConfDiff,
    ShareConfig,
};

pub use domain::entities::{
    ChapConfiguration, ChapDirection, Connection, DeviceType, Initiator, InitiatorGroup,
    LogicalUnitNumber, Portal, Session, Target, VirtualDevice,
};

pub use domain::ports::{
    Command, CommandOutput, CommandRunner, CommandRunnerRef, IscsiDriver, IscsiDriverRef,
};

pub use driver::{DriverFactory, SingleHostDriver};

pub use error::{Error, FailureKind, Result};

pub use exec::LocalRunner;

pub use settings::{SettingsStore, UserSettings, DEFAULT_SETTINGS_PATH};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
