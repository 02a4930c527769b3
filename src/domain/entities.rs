//! Domain entities for the shared-storage model
//!
//! Value objects describing the iSCSI administration surface: backing
//! devices, targets, portals, initiator groups and their relationships.
//! All of these are immutable by convention; discovery builds them,
//! callers never patch them in place.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// Devices
// =============================================================================

/// Backing device handler type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    BlockIo,
    FileIo,
}

impl DeviceType {
    /// All handler types known to the control surface
    pub const ALL: [DeviceType; 2] = [DeviceType::BlockIo, DeviceType::FileIo];
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::BlockIo => write!(f, "blockio"),
            DeviceType::FileIo => write!(f, "fileio"),
        }
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "blockio" | "block" => Ok(DeviceType::BlockIo),
            "fileio" | "file" => Ok(DeviceType::FileIo),
            other => Err(Error::Configuration(format!(
                "unknown device type: {}",
                other
            ))),
        }
    }
}

/// A virtual block or file device backing one or more LUNs
///
/// Identity is `(device_type, device_name)`; the control surface enforces
/// name uniqueness within a handler namespace, the model does not pre-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDevice {
    /// Device name, unique within its handler namespace
    pub device_name: String,
    /// Backing file or block device path
    pub file_path: String,
    /// Block size in bytes
    pub block_size: u64,
    /// Handler the device is registered under
    pub device_type: DeviceType,
}

impl VirtualDevice {
    pub fn new(
        device_name: impl Into<String>,
        file_path: impl Into<String>,
        block_size: u64,
        device_type: DeviceType,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            file_path: file_path.into(),
            block_size,
            device_type,
        }
    }
}

// =============================================================================
// Targets and Portals
// =============================================================================

/// An iSCSI target
///
/// The portal list is a derived view populated by discovery, not an
/// intrinsic property persisted with the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Unique iSCSI target identifier (IQN)
    pub name: String,
    /// Portals this target accepts connections through
    #[serde(default)]
    pub portals: Vec<Portal>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            portals: Vec::new(),
        }
    }
}

/// A network address through which a target accepts initiator connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portal {
    pub address: String,
}

impl Portal {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

// =============================================================================
// Initiator Groups
// =============================================================================

/// A host allowed to connect to a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiator {
    pub name: String,
}

/// A named group of initiators sharing a LUN layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatorGroup {
    pub name: String,
    #[serde(default)]
    pub initiators: Vec<Initiator>,
    #[serde(default)]
    pub luns: Vec<LogicalUnitNumber>,
}

/// A logical unit number mapping a device into a group's LUN layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalUnitNumber {
    pub unit_number: u64,
    /// Name of the virtual device exposed at this unit number
    pub device_name: String,
}

// =============================================================================
// Sessions and Connections
// =============================================================================

/// A live initiator session against a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub initiator_name: String,
}

/// A single connection within a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    pub address: String,
}

// =============================================================================
// CHAP
// =============================================================================

/// Direction of a CHAP credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapDirection {
    Incoming,
    Outgoing,
}

/// CHAP credentials attached to a target or group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapConfiguration {
    pub username: String,
    pub password: String,
    pub direction: ChapDirection,
}
