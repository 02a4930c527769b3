//! Domain ports - trait seams between the model and the host
//!
//! [`IscsiDriver`] is the capability contract over the entity model;
//! backends implement it without touching callers. [`CommandRunner`] is
//! the executor port the reference driver renders its commands through.

use crate::domain::entities::{
    ChapConfiguration, Connection, DeviceType, Initiator, InitiatorGroup, LogicalUnitNumber,
    Portal, Session, Target, VirtualDevice,
};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Command Execution Port
// =============================================================================

/// A command to run against the host
///
/// Argv commands run a program directly. Shell commands run a bash script
/// with positional arguments, so each argument stays individually quoted
/// no matter what it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Argv(Vec<String>),
    Shell { script: String, args: Vec<String> },
}

impl Command {
    /// Build an argv-style command
    pub fn argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::Argv(argv.into_iter().map(Into::into).collect())
    }

    /// Build a bash script command with positional arguments (`$1`..`$n`)
    pub fn bash<I, S>(script: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::Shell {
            script: script.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Argv(argv) => write!(f, "{}", argv.join(" ")),
            Command::Shell { script, args } => {
                write!(f, "{}", script)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
        }
    }
}

/// Structured result of a completed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A zero-exit output with the given stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Port for running commands against a host
///
/// Implementations classify a spawn failure or non-zero exit as a process
/// failure carrying the exit status and captured output. No retries, no
/// timeouts; every command is attempted exactly once.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &Command) -> Result<CommandOutput>;
}

// =============================================================================
// Storage Driver Port
// =============================================================================

/// Capability contract for iSCSI administration backends
///
/// Mutations return the pass-through [`CommandOutput`] of the final
/// control write; discovery returns entities parsed back out of the
/// control surface and never mutates it. Operations are not atomic across
/// multiple control writes - partial failure is surfaced to the caller.
#[async_trait]
pub trait IscsiDriver: Send + Sync {
    // ----- devices -----
    async fn add_virtual_device(&self, device: &VirtualDevice) -> Result<CommandOutput>;
    async fn remove_virtual_device(&self, device: &VirtualDevice) -> Result<CommandOutput>;

    // ----- targets -----
    async fn create_target(&self, target: &Target) -> Result<CommandOutput>;
    async fn remove_target(&self, target: &Target) -> Result<CommandOutput>;

    // ----- portals -----
    async fn add_portal_to_target(&self, target: &Target, portal: &Portal)
        -> Result<CommandOutput>;
    async fn remove_portal_from_target(
        &self,
        target: &Target,
        portal: &Portal,
    ) -> Result<CommandOutput>;

    // ----- initiator groups -----
    async fn add_initiator_group_to_target(
        &self,
        target: &Target,
        group: &InitiatorGroup,
    ) -> Result<CommandOutput>;
    async fn remove_initiator_group_from_target(
        &self,
        target: &Target,
        group: &InitiatorGroup,
    ) -> Result<CommandOutput>;
    async fn add_initiator_to_group(
        &self,
        group: &InitiatorGroup,
        initiator: &Initiator,
    ) -> Result<CommandOutput>;
    async fn remove_initiator_from_group(
        &self,
        group: &InitiatorGroup,
        initiator: &Initiator,
    ) -> Result<CommandOutput>;

    // ----- LUNs -----
    async fn add_lun_to_group(
        &self,
        lun: &LogicalUnitNumber,
        group: &InitiatorGroup,
    ) -> Result<CommandOutput>;
    async fn remove_lun_from_group(
        &self,
        lun: &LogicalUnitNumber,
        group: &InitiatorGroup,
    ) -> Result<CommandOutput>;

    // ----- CHAP -----
    async fn add_chap_configuration_to_target(
        &self,
        chap: &ChapConfiguration,
        target: &Target,
    ) -> Result<CommandOutput>;
    async fn remove_chap_configuration_from_target(
        &self,
        chap: &ChapConfiguration,
        target: &Target,
    ) -> Result<CommandOutput>;

    // ----- discovery -----
    /// List devices across every known device type
    async fn get_virtual_devices(&self) -> Result<Vec<VirtualDevice>>;
    /// List devices registered under one handler
    async fn get_virtual_devices_of_type(
        &self,
        device_type: DeviceType,
    ) -> Result<Vec<VirtualDevice>>;
    /// List targets, each populated with its portals
    async fn get_targets(&self) -> Result<Vec<Target>>;
    async fn get_portals_of_target(&self, target: &Target) -> Result<Vec<Portal>>;
    async fn get_initiator_groups_of_target(&self, target: &Target)
        -> Result<Vec<InitiatorGroup>>;
    async fn get_sessions_of_target(&self, target: &Target) -> Result<Vec<Session>>;
    async fn get_chap_configurations_of_target(
        &self,
        target: &Target,
    ) -> Result<Vec<ChapConfiguration>>;
    async fn get_connections_of_session(&self, session: &Session) -> Result<Vec<Connection>>;
    async fn get_luns_of_group(&self, group: &InitiatorGroup) -> Result<Vec<LogicalUnitNumber>>;
    async fn get_initiators_of_group(&self, group: &InitiatorGroup) -> Result<Vec<Initiator>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type CommandRunnerRef = Arc<dyn CommandRunner>;
pub type IscsiDriverRef = Arc<dyn IscsiDriver>;
