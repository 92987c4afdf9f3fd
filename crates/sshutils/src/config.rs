//! Connection configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SshError;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;
/// Default timeout for opening the transport, in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default per-command timeout, in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
/// Default number of attempts for a command (first try plus one retry)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// How the server's host key is verified during connect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Accept whatever key the server presents
    #[default]
    AcceptAny,
    /// Verify against the user's `~/.ssh/known_hosts`
    KnownHosts,
    /// Verify against a specific known_hosts file
    KnownHostsFile(PathBuf),
    /// Verify against `~/.ssh/known_hosts`, recording keys of unknown hosts
    TrustOnFirstUse,
    /// Verify against a specific known_hosts file, recording keys of unknown hosts
    TrustOnFirstUseFile(PathBuf),
}

/// Configuration for a single remote host
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// IP address or hostname
    pub host: String,
    /// Login user
    pub user: String,
    /// Password (mutually exclusive with `key_path`)
    #[serde(default)]
    pub password: Option<String>,
    /// Path to a private key file (mutually exclusive with `password`)
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds allowed for opening and authenticating the transport
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds allowed for a command when the caller gives no timeout
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Total attempts for a command that fails with a transient error
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Server host key verification
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Whole seconds, rounding any fraction up
fn secs_rounded_up(timeout: Duration) -> u64 {
    timeout
        .as_secs()
        .saturating_add(u64::from(timeout.subsec_nanos() > 0))
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field("port", &self.port)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("host_key_policy", &self.host_key_policy)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a config with no credential and default settings
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: None,
            key_path: None,
            port: DEFAULT_PORT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            host_key_policy: HostKeyPolicy::default(),
        }
    }

    /// Authenticate with a password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Authenticate with the private key at `path`
    #[must_use]
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the host key verification policy
    #[must_use]
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Set the connect timeout
    ///
    /// Stored in whole seconds; a fractional timeout is rounded up.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = secs_rounded_up(timeout);
        self
    }

    /// Set the default command timeout
    ///
    /// Stored in whole seconds; a fractional timeout is rounded up.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_secs = secs_rounded_up(timeout);
        self
    }

    /// Set the total number of attempts for a command
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Connect timeout as a `Duration`
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Default command timeout as a `Duration`
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Check the configuration before any network I/O happens
    ///
    /// # Errors
    /// Returns `SshError::Config` if host or user are empty, if not exactly one
    /// of password and key path is set, or if a numeric setting is zero
    pub fn validate(&self) -> Result<(), SshError> {
        if self.host.trim().is_empty() {
            return Err(SshError::Config("host must not be empty".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(SshError::Config("user must not be empty".to_string()));
        }
        match (&self.password, &self.key_path) {
            (Some(_), Some(_)) => {
                return Err(SshError::Config(
                    "password and key_path are mutually exclusive".to_string(),
                ));
            }
            (None, None) => {
                return Err(SshError::Config(
                    "either password or key_path must be provided".to_string(),
                ));
            }
            _ => {}
        }
        if self.port == 0 {
            return Err(SshError::Config("port must be non-zero".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(SshError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.connect_timeout_secs == 0 || self.command_timeout_secs == 0 {
            return Err(SshError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}
