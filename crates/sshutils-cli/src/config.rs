//! Configuration file loading and merging with command-line flags

use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr, bail};
use serde::{Deserialize, Serialize};
use sshutils::{ConnectionConfig, HostKeyPolicy};

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "SSHUTILS_CONFIG";

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Defaults for the connection flags
    #[serde(default)]
    pub connection: ConnectionDefaults,
}

/// Connection settings that may come from the file; flags take precedence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionDefaults {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub connect_timeout_secs: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub host_key_policy: Option<HostKeyPolicy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            connection: ConnectionDefaults::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load from an explicit path, the environment, or the default locations
    ///
    /// # Errors
    /// Returns error if an explicitly named file cannot be loaded
    pub fn load_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        let mut paths = vec![PathBuf::from("sshutils.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sshutils/sshutils.toml"));
        }

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }
}

/// Connection values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub connect_timeout_secs: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub host_key_policy: Option<HostKeyPolicy>,
}

impl ConnectionDefaults {
    /// Merge command-line overrides on top of the file values
    ///
    /// A credential given on the command line replaces the file's credential
    /// entirely, so a file password never combines with a flag key path.
    ///
    /// # Errors
    /// Returns error if host or user is missing from both sources
    pub fn resolve(&self, overrides: ConnectionOverrides) -> Result<ConnectionConfig> {
        let Some(host) = overrides.host.or_else(|| self.host.clone()) else {
            bail!("no host given (use --host or set connection.host)");
        };
        let Some(user) = overrides.user.or_else(|| self.user.clone()) else {
            bail!("no user given (use --user or set connection.user)");
        };

        let mut config = ConnectionConfig::new(host, user);

        if overrides.password.is_some() || overrides.key_path.is_some() {
            config.password = overrides.password;
            config.key_path = overrides.key_path;
        } else {
            config.password = self.password.clone();
            config.key_path = self.key_path.clone();
        }

        if let Some(port) = overrides.port.or(self.port) {
            config.port = port;
        }
        if let Some(secs) = overrides.connect_timeout_secs.or(self.connect_timeout_secs) {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = overrides.command_timeout_secs.or(self.command_timeout_secs) {
            config.command_timeout_secs = secs;
        }
        if let Some(attempts) = overrides.max_attempts.or(self.max_attempts) {
            config.max_attempts = attempts;
        }
        if let Some(policy) = overrides
            .host_key_policy
            .or_else(|| self.host_key_policy.clone())
        {
            config.host_key_policy = policy;
        }

        Ok(config)
    }
}
