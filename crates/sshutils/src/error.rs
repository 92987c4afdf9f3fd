//! Error types for sshutils

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a remote host
#[derive(Error, Debug, Clone)]
pub enum SshError {
    /// Invalid configuration (missing or conflicting credentials, bad values)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transport or negotiation level fault
    #[error("SSH protocol error: {0}")]
    Protocol(String),

    /// Server host key was rejected by the configured policy
    #[error("host key rejected for {host}: {reason}")]
    HostKeyRejected {
        /// Host whose key was rejected
        host: String,
        /// Why the key was rejected
        reason: String,
    },

    /// Private key could not be read or decoded
    #[error("SSH key error: {0}")]
    Key(String),

    /// I/O error on the underlying socket
    #[error("I/O error: {0}")]
    Io(String),

    /// The session or channel went away underneath us
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// Operation timed out
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },
}

impl SshError {
    /// Check if error is transient, i.e. worth a reconnect and another attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SshError::Io(_) | SshError::Disconnected(_) | SshError::Timeout { .. }
        )
    }
}

impl From<std::io::Error> for SshError {
    fn from(e: std::io::Error) -> Self {
        SshError::Io(e.to_string())
    }
}

impl From<russh::Error> for SshError {
    fn from(e: russh::Error) -> Self {
        match e {
            russh::Error::IO(io) => SshError::Io(io.to_string()),
            russh::Error::Disconnect | russh::Error::HUP => SshError::Disconnected(e.to_string()),
            russh::Error::InactivityTimeout | russh::Error::KeepaliveTimeout => {
                SshError::Disconnected(e.to_string())
            }
            russh::Error::NotAuthenticated => SshError::AuthenticationFailed(e.to_string()),
            other => SshError::Protocol(other.to_string()),
        }
    }
}
