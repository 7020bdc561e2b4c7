//! Command result and error types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Error types for packaging-tool invocations
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with code {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("{command} timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("failed to decode output of {command}: {source}")]
    Decode {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("cache cleanup failed at {}: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Raw output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Rendered command line, for logs and errors
    pub command: String,
    /// Exit code (-1 when terminated by a signal)
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Convert a non-zero exit into [`CommandError::Failed`]
    pub fn into_result(self) -> Result<String, CommandError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(CommandError::Failed {
                command: self.command,
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Result of a trust-info verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustVerification {
    /// False when the stored trust info no longer matches
    pub success: bool,

    /// Short human-readable explanation
    pub detail: String,

    /// Combined raw output of the verifier
    pub output: String,
}

impl TrustVerification {
    pub fn trusted(output: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: "trust info verified".to_string(),
            output: output.into(),
        }
    }

    pub fn mismatch(detail: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
            output: output.into(),
        }
    }
}
