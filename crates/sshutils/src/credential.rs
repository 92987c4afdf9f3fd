//! Credential selection and private key file checks

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::SshError;

/// How the client proves its identity to the server
#[derive(Clone)]
pub enum Credential {
    /// Password authentication
    Password(String),
    /// Public key authentication with the private key at this path
    KeyFile(PathBuf),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

impl Credential {
    /// Pick the credential out of a configuration
    ///
    /// # Errors
    /// Returns `SshError::Config` unless exactly one of password and key path is set
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, SshError> {
        match (&config.password, &config.key_path) {
            (Some(password), None) => Ok(Credential::Password(password.clone())),
            (None, Some(path)) => Ok(Credential::KeyFile(path.clone())),
            (Some(_), Some(_)) => Err(SshError::Config(
                "password and key_path are mutually exclusive".to_string(),
            )),
            (None, None) => Err(SshError::Config(
                "either password or key_path must be provided".to_string(),
            )),
        }
    }

    /// Short name of the authentication method, for logs
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::KeyFile(_) => "publickey",
        }
    }
}

/// Check that a private key file exists and is not readable by others
///
/// Loose permissions are logged, not rejected.
///
/// # Errors
/// Returns `SshError::Key` if the file does not exist or cannot be inspected
pub fn check_key_file(path: &Path) -> Result<(), SshError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| SshError::Key(format!("{}: {e}", path.display())))?;

    if !metadata.is_file() {
        return Err(SshError::Key(format!("{} is not a file", path.display())));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        // group and other bits
        let mode = metadata.permissions().mode();
        if mode & 0o77 != 0 {
            let mode = format!("{:o}", mode & 0o777);
            warn!(
                path = %path.display(),
                mode = %mode,
                "private key permissions are too open (should be 600)"
            );
        }
    }

    debug!(path = %path.display(), "private key file found");
    Ok(())
}
