//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// stdout, whitespace-trimmed
    pub stdout: String,
    /// stderr, whitespace-trimmed
    pub stderr: String,
    /// Exit status code (-1 if the server never sent one)
    pub exit_code: i32,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandOutput {
    /// Build an output from raw stream bytes, decoding lossily and trimming
    #[must_use]
    pub fn from_raw(stdout: &[u8], stderr: &[u8], exit_code: i32, duration: Duration) -> Self {
        Self {
            stdout: String::from_utf8_lossy(stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
            exit_code,
            duration,
        }
    }

    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Split into the `(stdout, stderr, exit_code)` triple
    #[must_use]
    pub fn into_parts(self) -> (String, String, i32) {
        (self.stdout, self.stderr, self.exit_code)
    }
}
