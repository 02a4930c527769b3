//! Local command execution
//!
//! Reference [`CommandRunner`] implementation running commands on the
//! local host. Shell commands are handed to bash as a script plus
//! positional arguments, so every argument reaches the script already
//! quoted regardless of its content.

use crate::domain::ports::{Command, CommandOutput, CommandRunner};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Runs commands on the local host via `tokio::process`
///
/// One attempt per command, no retry, no timeout; a spawn failure or a
/// non-zero exit comes back as a classified process failure carrying the
/// captured output.
#[derive(Debug, Default, Clone)]
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, command: &Command) -> Result<CommandOutput> {
        debug!("running: {}", command);

        let output = match command {
            Command::Argv(argv) => {
                let program = argv.first().ok_or_else(|| {
                    Error::Configuration("cannot run a command with an empty argv".into())
                })?;
                tokio::process::Command::new(program)
                    .args(&argv[1..])
                    .output()
                    .await
            }
            // `bash -c <script> bash <args...>` binds args to $1..$n
            Command::Shell { script, args } => tokio::process::Command::new("bash")
                .arg("-c")
                .arg(script)
                .arg("bash")
                .args(args)
                .output()
                .await,
        }
        .map_err(|source| Error::CommandSpawn {
            command: command.to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                exit_code,
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}
