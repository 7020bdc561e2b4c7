//! AutoPkg CLI subprocess client

use crate::autopkg::{CommandError, CommandOutput};
use std::ffi::OsString;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs the `autopkg` executable and captures its output
#[derive(Debug, Clone)]
pub struct AutopkgSubprocess {
    /// Path to autopkg executable
    program: String,

    /// Timeout for command execution in seconds
    timeout_secs: u64,
}

impl AutopkgSubprocess {
    /// Create a new subprocess client
    ///
    /// # Arguments
    /// * `program` - Path to autopkg executable (e.g., "autopkg", "/usr/local/bin/autopkg")
    /// * `timeout_secs` - Timeout for each command in seconds
    pub fn new(program: String, timeout_secs: u64) -> Self {
        Self {
            program,
            timeout_secs,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `autopkg <args>` to completion
    ///
    /// A non-zero exit is not an error here; callers decide via
    /// [`CommandOutput::into_result`] or by inspecting the exit code.
    ///
    /// # Errors
    /// Returns `CommandError` if:
    /// - The executable cannot be spawned
    /// - The output is not valid UTF-8
    /// - The command times out
    pub async fn run(&self, args: Vec<OsString>) -> Result<CommandOutput, CommandError> {
        let command = self.render(&args);
        debug!("Spawning {}", command);

        let result = timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new(&self.program)
                .args(&args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| CommandError::Timeout {
            command: command.clone(),
            secs: self.timeout_secs,
        })?;

        let output = result.map_err(|source| CommandError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8(output.stdout).map_err(|source| CommandError::Decode {
            command: command.clone(),
            source,
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if code != 0 {
            warn!("{} exited with code {}: {}", command, code, stderr.trim());
        } else {
            debug!("{} returned {} bytes of output", command, stdout.len());
        }

        Ok(CommandOutput {
            command,
            code,
            stdout,
            stderr,
        })
    }

    fn render(&self, args: &[OsString]) -> String {
        let mut rendered = self.program.clone();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }
}
