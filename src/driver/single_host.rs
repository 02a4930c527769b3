//! Single-Host Driver
//!
//! Reference [`IscsiDriver`] implementation against an SCST-style kernel
//! target framework. Each manageable object is a directory in the control
//! pseudo-filesystem; mutation happens by writing a command string to the
//! `mgmt` file of the relevant scope, discovery by listing child
//! directories and reading attribute files back out.
//!
//! The driver is stateless between calls - all state lives in the control
//! surface, whose own concurrency semantics are inherited as-is.

use crate::domain::entities::{
    ChapConfiguration, Connection, DeviceType, Initiator, InitiatorGroup, LogicalUnitNumber,
    Portal, Session, Target, VirtualDevice,
};
use crate::domain::ports::{Command, CommandOutput, CommandRunnerRef, IscsiDriver};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info};

// =============================================================================
// Control Paths
// =============================================================================

const BLOCKIO_HANDLER_ROOT: &str = "/sys/kernel/scst_tgt/handlers/vdisk_blockio";
const FILEIO_HANDLER_ROOT: &str = "/sys/kernel/scst_tgt/handlers/vdisk_fileio";
const TARGET_ROOT: &str = "/sys/kernel/scst_tgt/targets/iscsi";

fn handler_root(device_type: DeviceType) -> &'static str {
    match device_type {
        DeviceType::BlockIo => BLOCKIO_HANDLER_ROOT,
        DeviceType::FileIo => FILEIO_HANDLER_ROOT,
    }
}

// =============================================================================
// Command Builders
// =============================================================================

/// Enumerate immediate child directories/symlinks of a scope directory,
/// null-separated so arbitrary names survive
fn list_children_command(root: &str) -> Command {
    Command::argv([
        "find", root, "-mindepth", "1", "-maxdepth", "1", "(", "-type", "d", "-o", "-type", "l",
        ")", "-printf", "%f\\0",
    ])
}

/// Enumerate a target's `allowed_portal*` attribute files
fn portal_files_command(target_dir: &str) -> Command {
    Command::argv(["find", target_dir, "-name", "allowed_portal*", "-printf", "%f\\0"])
}

fn read_file_command(path: &str) -> Command {
    Command::argv(["cat", path])
}

fn split_nul(stdout: &str) -> Vec<String> {
    stdout
        .split('\0')
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

// =============================================================================
// Single-Host Driver
// =============================================================================

/// Drives the local SCST control tree through a [`CommandRunnerRef`]
pub struct SingleHostDriver {
    runner: CommandRunnerRef,
}

impl SingleHostDriver {
    pub fn new(runner: CommandRunnerRef) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl IscsiDriver for SingleHostDriver {
    async fn add_virtual_device(&self, device: &VirtualDevice) -> Result<CommandOutput> {
        info!(
            "adding {} device {} backed by {}",
            device.device_type, device.device_name, device.file_path
        );
        self.runner
            .run(&Command::bash(
                r#"echo "add_device $1 $2" > $3"#,
                [
                    device.device_name.clone(),
                    format!(
                        "filename={};blocksize={}",
                        device.file_path, device.block_size
                    ),
                    format!("{}/mgmt", handler_root(device.device_type)),
                ],
            ))
            .await
    }

    async fn remove_virtual_device(&self, device: &VirtualDevice) -> Result<CommandOutput> {
        info!(
            "removing {} device {}",
            device.device_type, device.device_name
        );
        self.runner
            .run(&Command::bash(
                r#"echo "del_device $1" > $2"#,
                [
                    device.device_name.clone(),
                    format!("{}/mgmt", handler_root(device.device_type)),
                ],
            ))
            .await
    }

    async fn create_target(&self, target: &Target) -> Result<CommandOutput> {
        info!("creating target {}", target.name);
        self.runner
            .run(&Command::bash(
                r#"echo "add_target $1" > $2"#,
                [target.name.clone(), format!("{}/mgmt", TARGET_ROOT)],
            ))
            .await
    }

    async fn remove_target(&self, target: &Target) -> Result<CommandOutput> {
        info!("removing target {}", target.name);
        self.runner
            .run(&Command::bash(
                r#"echo "del_target $1" > $2"#,
                [target.name.clone(), format!("{}/mgmt", TARGET_ROOT)],
            ))
            .await
    }

    async fn add_portal_to_target(
        &self,
        target: &Target,
        portal: &Portal,
    ) -> Result<CommandOutput> {
        info!("allowing portal {} on target {}", portal.address, target.name);
        self.runner
            .run(&Command::bash(
                r#"echo "add_target_attribute $1 $2" > $3"#,
                [
                    target.name.clone(),
                    format!("allowed_portal={}", portal.address),
                    format!("{}/mgmt", TARGET_ROOT),
                ],
            ))
            .await
    }

    async fn remove_portal_from_target(
        &self,
        target: &Target,
        portal: &Portal,
    ) -> Result<CommandOutput> {
        info!(
            "removing portal {} from target {}",
            portal.address, target.name
        );
        self.runner
            .run(&Command::bash(
                r#"echo "del_target_attribute $1 $2" > $3"#,
                [
                    target.name.clone(),
                    format!("allowed_portal={}", portal.address),
                    format!("{}/mgmt", TARGET_ROOT),
                ],
            ))
            .await
    }

    async fn add_initiator_group_to_target(
        &self,
        _target: &Target,
        _group: &InitiatorGroup,
    ) -> Result<CommandOutput> {
        Err(Error::NotImplemented {
            operation: "add_initiator_group_to_target",
        })
    }

    async fn remove_initiator_group_from_target(
        &self,
        _target: &Target,
        _group: &InitiatorGroup,
    ) -> Result<CommandOutput> {
        Err(Error::NotImplemented {
            operation: "remove_initiator_group_from_target",
        })
    }

    async fn add_initiator_to_group(
        &self,
        _group: &InitiatorGroup,
        _initiator: &Initiator,
    ) -> Result<CommandOutput> {
        Err(Error::NotImplemented {
            operation: "add_initiator_to_group",
        })
    }

    async fn remove_initiator_from_group(
        &self,
        _group: &InitiatorGroup,
        _initiator: &Initiator,
    ) -> Result<CommandOutput> {
        Err(Error::NotImplemented {
            operation: "remove_initiator_from_group",
        })
    }

    async fn add_lun_to_group(
        &self,
        _lun: &LogicalUnitNumber,
        _group: &InitiatorGroup,
    ) -> Result<CommandOutput> {
        Err(Error::NotImplemented {
            operation: "add_lun_to_group",
        })
    }

    async fn remove_lun_from_group(
        &self,
        _lun: &LogicalUnitNumber,
        _group: &InitiatorGroup,
    ) -> Result<CommandOutput> {
        Err(Error::NotImplemented {
            operation: "remove_lun_from_group",
        })
    }

    async fn add_chap_configuration_to_target(
        &self,
        _chap: &ChapConfiguration,
        _target: &Target,
    ) -> Result<CommandOutput> {
        Err(Error::NotImplemented {
            operation: "add_chap_configuration_to_target",
        })
    }

    async fn remove_chap_configuration_from_target(
        &self,
        _chap: &ChapConfiguration,
        _target: &Target,
    ) -> Result<CommandOutput> {
        Err(Error::NotImplemented {
            operation: "remove_chap_configuration_from_target",
        })
    }

    async fn get_virtual_devices(&self) -> Result<Vec<VirtualDevice>> {
        let tasks: Vec<JoinHandle<Result<Vec<VirtualDevice>>>> = DeviceType::ALL
            .into_iter()
            .map(|device_type| tokio::spawn(devices_of_type(self.runner.clone(), device_type)))
            .collect();

        let per_type = join_fail_fast(tasks).await?;
        Ok(per_type.into_iter().flatten().collect())
    }

    async fn get_virtual_devices_of_type(
        &self,
        device_type: DeviceType,
    ) -> Result<Vec<VirtualDevice>> {
        devices_of_type(self.runner.clone(), device_type).await
    }

    async fn get_targets(&self) -> Result<Vec<Target>> {
        let output = self.runner.run(&list_children_command(TARGET_ROOT)).await?;
        let names = split_nul(&output.stdout);
        debug!("found {} target(s)", names.len());

        let tasks: Vec<JoinHandle<Result<Target>>> = names
            .into_iter()
            .map(|name| {
                let runner = self.runner.clone();
                tokio::spawn(async move {
                    let portals = portals_of(runner, &name).await?;
                    Ok(Target { name, portals })
                })
            })
            .collect();

        join_fail_fast(tasks).await
    }

    async fn get_portals_of_target(&self, target: &Target) -> Result<Vec<Portal>> {
        portals_of(self.runner.clone(), &target.name).await
    }

    async fn get_initiator_groups_of_target(
        &self,
        _target: &Target,
    ) -> Result<Vec<InitiatorGroup>> {
        Err(Error::NotImplemented {
            operation: "get_initiator_groups_of_target",
        })
    }

    async fn get_sessions_of_target(&self, _target: &Target) -> Result<Vec<Session>> {
        Err(Error::NotImplemented {
            operation: "get_sessions_of_target",
        })
    }

    async fn get_chap_configurations_of_target(
        &self,
        _target: &Target,
    ) -> Result<Vec<ChapConfiguration>> {
        Err(Error::NotImplemented {
            operation: "get_chap_configurations_of_target",
        })
    }

    async fn get_connections_of_session(&self, _session: &Session) -> Result<Vec<Connection>> {
        Err(Error::NotImplemented {
            operation: "get_connections_of_session",
        })
    }

    async fn get_luns_of_group(
        &self,
        _group: &InitiatorGroup,
    ) -> Result<Vec<LogicalUnitNumber>> {
        Err(Error::NotImplemented {
            operation: "get_luns_of_group",
        })
    }

    async fn get_initiators_of_group(&self, _group: &InitiatorGroup) -> Result<Vec<Initiator>> {
        Err(Error::NotImplemented {
            operation: "get_initiators_of_group",
        })
    }
}

// =============================================================================
// Discovery
// =============================================================================

async fn devices_of_type(
    runner: CommandRunnerRef,
    device_type: DeviceType,
) -> Result<Vec<VirtualDevice>> {
    let root = handler_root(device_type);
    let output = runner.run(&list_children_command(root)).await?;
    let names = split_nul(&output.stdout);
    debug!("found {} {} device(s)", names.len(), device_type);

    let tasks: Vec<JoinHandle<Result<VirtualDevice>>> = names
        .into_iter()
        .map(|name| tokio::spawn(read_device(runner.clone(), device_type, name)))
        .collect();

    join_fail_fast(tasks).await
}

async fn read_device(
    runner: CommandRunnerRef,
    device_type: DeviceType,
    name: String,
) -> Result<VirtualDevice> {
    let device_dir = format!("{}/{}", handler_root(device_type), name);

    // join! rather than try_join!: an attribute read that fails must not
    // cancel its in-flight sibling
    let (block_size, file_path) = tokio::join!(
        read_block_size(&runner, format!("{}/blocksize", device_dir)),
        read_first_line(
            &runner,
            format!("{}/filename", device_dir),
            "backing file path",
        ),
    );
    let block_size = block_size?;
    let file_path = file_path?;

    Ok(VirtualDevice::new(name, file_path, block_size, device_type))
}

async fn portals_of(runner: CommandRunnerRef, target_name: &str) -> Result<Vec<Portal>> {
    let target_dir = format!("{}/{}", TARGET_ROOT, target_name);
    let output = runner.run(&portal_files_command(&target_dir)).await?;
    let files = split_nul(&output.stdout);

    let tasks: Vec<JoinHandle<Result<Portal>>> = files
        .into_iter()
        .map(|file| {
            let runner = runner.clone();
            let path = format!("{}/{}", target_dir, file);
            tokio::spawn(async move {
                let address = read_first_line(&runner, path, "portal address").await?;
                Ok(Portal::new(address))
            })
        })
        .collect();

    join_fail_fast(tasks).await
}

async fn read_block_size(runner: &CommandRunnerRef, path: String) -> Result<u64> {
    let output = runner.run(&read_file_command(&path)).await?;
    let raw = output.stdout.trim();
    raw.parse::<u64>().map_err(|_| Error::Parse {
        what: "block size".into(),
        found: raw.to_string(),
    })
}

async fn read_first_line(
    runner: &CommandRunnerRef,
    path: String,
    what: &str,
) -> Result<String> {
    let output = runner.run(&read_file_command(&path)).await?;
    output
        .stdout
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| Error::Parse {
            what: what.to_string(),
            found: output.stdout.clone(),
        })
}

/// Join spawned discovery units, then fold fail-fast
///
/// Every unit runs to completion before results are combined; the first
/// failure in item order becomes the overall result.
async fn join_fail_fast<T>(tasks: Vec<JoinHandle<Result<T>>>) -> Result<Vec<T>> {
    let mut items = Vec::with_capacity(tasks.len());
    for joined in join_all(tasks).await {
        let item =
            joined.map_err(|e| Error::Internal(format!("discovery task failed: {}", e)))??;
        items.push(item);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::CommandRunner;
    use assert_matches::assert_matches;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Runner answering from a canned command -> output table; a non-zero
    /// exit code in the table comes back as a process failure, like the
    /// real runner
    struct ScriptedRunner {
        responses: HashMap<String, CommandOutput>,
    }

    impl ScriptedRunner {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
            }
        }

        fn expect(mut self, command: Command, output: CommandOutput) -> Self {
            self.responses.insert(command.to_string(), output);
            self
        }

        fn into_driver(self) -> SingleHostDriver {
            SingleHostDriver::new(Arc::new(self))
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, command: &Command) -> Result<CommandOutput> {
            let output = self
                .responses
                .get(&command.to_string())
                .cloned()
                .ok_or_else(|| Error::Internal(format!("unexpected command: {}", command)))?;
            if output.exit_code != 0 {
                return Err(Error::CommandFailed {
                    command: command.to_string(),
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
            }
            Ok(output)
        }
    }

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[tokio::test]
    async fn test_device_discovery_parses_attributes() {
        let driver = ScriptedRunner::new()
            .expect(
                list_children_command(BLOCKIO_HANDLER_ROOT),
                CommandOutput::success("disk0\0"),
            )
            .expect(
                list_children_command(FILEIO_HANDLER_ROOT),
                CommandOutput::success(""),
            )
            .expect(
                read_file_command(&format!("{}/disk0/blocksize", BLOCKIO_HANDLER_ROOT)),
                CommandOutput::success("512\n"),
            )
            .expect(
                read_file_command(&format!("{}/disk0/filename", BLOCKIO_HANDLER_ROOT)),
                CommandOutput::success("/data/disk.img\n"),
            )
            .into_driver();

        let devices = driver.get_virtual_devices().await.unwrap();

        assert_eq!(
            devices,
            vec![VirtualDevice::new(
                "disk0",
                "/data/disk.img",
                512,
                DeviceType::BlockIo
            )]
        );
    }

    #[tokio::test]
    async fn test_non_integer_block_size_is_a_parse_failure() {
        let driver = ScriptedRunner::new()
            .expect(
                list_children_command(BLOCKIO_HANDLER_ROOT),
                CommandOutput::success("disk0\0"),
            )
            .expect(
                read_file_command(&format!("{}/disk0/blocksize", BLOCKIO_HANDLER_ROOT)),
                CommandOutput::success("abc"),
            )
            .expect(
                read_file_command(&format!("{}/disk0/filename", BLOCKIO_HANDLER_ROOT)),
                CommandOutput::success("/data/disk.img\n"),
            )
            .into_driver();

        let err = driver
            .get_virtual_devices_of_type(DeviceType::BlockIo)
            .await
            .unwrap_err();

        assert_matches!(err, Error::Parse { ref found, .. } if found == "abc");
    }

    #[tokio::test]
    async fn test_empty_filename_is_a_parse_failure() {
        let driver = ScriptedRunner::new()
            .expect(
                list_children_command(FILEIO_HANDLER_ROOT),
                CommandOutput::success("vol1\0"),
            )
            .expect(
                read_file_command(&format!("{}/vol1/blocksize", FILEIO_HANDLER_ROOT)),
                CommandOutput::success("4096\n"),
            )
            .expect(
                read_file_command(&format!("{}/vol1/filename", FILEIO_HANDLER_ROOT)),
                CommandOutput::success(""),
            )
            .into_driver();

        let err = driver
            .get_virtual_devices_of_type(DeviceType::FileIo)
            .await
            .unwrap_err();

        assert!(err.is_parse());
    }

    #[tokio::test]
    async fn test_one_failed_handler_fails_the_whole_device_listing() {
        let driver = ScriptedRunner::new()
            .expect(
                list_children_command(BLOCKIO_HANDLER_ROOT),
                CommandOutput::success(""),
            )
            .expect(
                list_children_command(FILEIO_HANDLER_ROOT),
                failed("Permission denied"),
            )
            .into_driver();

        let err = driver.get_virtual_devices().await.unwrap_err();

        assert_matches!(err, Error::CommandFailed { exit_code: 1, .. });
    }

    #[tokio::test]
    async fn test_empty_target_directory_lists_nothing() {
        let driver = ScriptedRunner::new()
            .expect(
                list_children_command(TARGET_ROOT),
                CommandOutput::success(""),
            )
            .into_driver();

        assert!(driver.get_targets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_targets_are_populated_with_portals() {
        let target_dir = format!("{}/iqn.2024-01.com.example:tank", TARGET_ROOT);
        let driver = ScriptedRunner::new()
            .expect(
                list_children_command(TARGET_ROOT),
                CommandOutput::success("iqn.2024-01.com.example:tank\0"),
            )
            .expect(
                portal_files_command(&target_dir),
                CommandOutput::success("allowed_portal0\0allowed_portal1\0"),
            )
            .expect(
                read_file_command(&format!("{}/allowed_portal0", target_dir)),
                CommandOutput::success("192.168.1.10\n"),
            )
            .expect(
                read_file_command(&format!("{}/allowed_portal1", target_dir)),
                CommandOutput::success("192.168.1.11\n"),
            )
            .into_driver();

        let targets = driver.get_targets().await.unwrap();

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "iqn.2024-01.com.example:tank");
        assert_eq!(
            targets[0].portals,
            vec![Portal::new("192.168.1.10"), Portal::new("192.168.1.11")]
        );
    }

    #[tokio::test]
    async fn test_missing_portal_address_is_a_parse_failure() {
        let target_dir = format!("{}/iqn.a", TARGET_ROOT);
        let driver = ScriptedRunner::new()
            .expect(
                portal_files_command(&target_dir),
                CommandOutput::success("allowed_portal0\0"),
            )
            .expect(
                read_file_command(&format!("{}/allowed_portal0", target_dir)),
                CommandOutput::success(""),
            )
            .into_driver();

        let err = driver
            .get_portals_of_target(&Target::new("iqn.a"))
            .await
            .unwrap_err();

        assert!(err.is_parse());
    }

    #[tokio::test]
    async fn test_add_device_renders_mgmt_write() {
        let device = VirtualDevice::new("disk0", "/data/disk.img", 512, DeviceType::BlockIo);
        let driver = ScriptedRunner::new()
            .expect(
                Command::bash(
                    r#"echo "add_device $1 $2" > $3"#,
                    [
                        "disk0".to_string(),
                        "filename=/data/disk.img;blocksize=512".to_string(),
                        format!("{}/mgmt", BLOCKIO_HANDLER_ROOT),
                    ],
                ),
                CommandOutput::success(""),
            )
            .into_driver();

        let out = driver.add_virtual_device(&device).await.unwrap();
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_remove_device_renders_mgmt_write() {
        let device = VirtualDevice::new("disk0", "/data/disk.img", 512, DeviceType::FileIo);
        let driver = ScriptedRunner::new()
            .expect(
                Command::bash(
                    r#"echo "del_device $1" > $2"#,
                    [
                        "disk0".to_string(),
                        format!("{}/mgmt", FILEIO_HANDLER_ROOT),
                    ],
                ),
                CommandOutput::success(""),
            )
            .into_driver();

        driver.remove_virtual_device(&device).await.unwrap();
    }

    #[tokio::test]
    async fn test_target_and_portal_mutations_render_mgmt_writes() {
        let target = Target::new("iqn.a");
        let portal = Portal::new("192.168.1.10");
        let mgmt = format!("{}/mgmt", TARGET_ROOT);

        let driver = ScriptedRunner::new()
            .expect(
                Command::bash(
                    r#"echo "add_target $1" > $2"#,
                    ["iqn.a".to_string(), mgmt.clone()],
                ),
                CommandOutput::success(""),
            )
            .expect(
                Command::bash(
                    r#"echo "del_target $1" > $2"#,
                    ["iqn.a".to_string(), mgmt.clone()],
                ),
                CommandOutput::success(""),
            )
            .expect(
                Command::bash(
                    r#"echo "add_target_attribute $1 $2" > $3"#,
                    [
                        "iqn.a".to_string(),
                        "allowed_portal=192.168.1.10".to_string(),
                        mgmt.clone(),
                    ],
                ),
                CommandOutput::success(""),
            )
            .expect(
                Command::bash(
                    r#"echo "del_target_attribute $1 $2" > $3"#,
                    [
                        "iqn.a".to_string(),
                        "allowed_portal=192.168.1.10".to_string(),
                        mgmt,
                    ],
                ),
                CommandOutput::success(""),
            )
            .into_driver();

        driver.create_target(&target).await.unwrap();
        driver.add_portal_to_target(&target, &portal).await.unwrap();
        driver
            .remove_portal_from_target(&target, &portal)
            .await
            .unwrap();
        driver.remove_target(&target).await.unwrap();
    }

    #[tokio::test]
    async fn test_unimplemented_operations_are_classified() {
        let driver = ScriptedRunner::new().into_driver();
        let target = Target::new("iqn.a");
        let group = InitiatorGroup {
            name: "hosts".into(),
            initiators: Vec::new(),
            luns: Vec::new(),
        };

        let err = driver
            .add_initiator_group_to_target(&target, &group)
            .await
            .unwrap_err();
        assert!(err.is_not_implemented());

        let err = driver.get_sessions_of_target(&target).await.unwrap_err();
        assert!(err.is_not_implemented());

        let err = driver.get_luns_of_group(&group).await.unwrap_err();
        assert!(err.is_not_implemented());
    }
}
