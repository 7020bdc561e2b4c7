//! Packaging-tool client configuration

/// Configuration for the AutoPkg subprocess client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutopkgClientConfig {
    /// Path to the `autopkg` executable.
    ///
    /// If not provided, defaults to "autopkg" (assumes it's on PATH).
    pub executable: Option<String>,

    /// Timeout for a single command in seconds
    pub timeout_secs: u64,
}

impl Default for AutopkgClientConfig {
    fn default() -> Self {
        Self {
            executable: None,
            timeout_secs: 3600,
        }
    }
}

impl AutopkgClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
