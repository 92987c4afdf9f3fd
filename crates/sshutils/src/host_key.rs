//! Server host key verification

use std::path::Path;

use russh::client;
use russh::keys::{known_hosts, ssh_key};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::HostKeyPolicy;
use crate::error::SshError;

/// Error type for the russh client handler
#[derive(Error, Debug)]
pub(crate) enum HandlerError {
    #[error(transparent)]
    Russh(#[from] russh::Error),

    #[error("host key rejected for {host}: {reason}")]
    HostKey { host: String, reason: String },
}

impl From<HandlerError> for SshError {
    fn from(e: HandlerError) -> Self {
        match e {
            HandlerError::Russh(e) => e.into(),
            HandlerError::HostKey { host, reason } => SshError::HostKeyRejected { host, reason },
        }
    }
}

/// russh client handler that applies a `HostKeyPolicy`
#[derive(Debug)]
pub(crate) struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    pub(crate) fn new(host: impl Into<String>, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
        }
    }

    fn rejected(&self, reason: impl Into<String>) -> HandlerError {
        HandlerError::HostKey {
            host: self.host.clone(),
            reason: reason.into(),
        }
    }

    fn verify_known(
        &self,
        key: &ssh_key::PublicKey,
        path: Option<&Path>,
    ) -> Result<bool, HandlerError> {
        let found = match path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };
        found.map_err(|e| self.rejected(e.to_string()))
    }

    /// Accept a known key, or record and accept the key of an unknown host
    ///
    /// A key that differs from the recorded one is still rejected.
    fn trust_on_first_use(
        &self,
        key: &ssh_key::PublicKey,
        path: Option<&Path>,
    ) -> Result<bool, HandlerError> {
        if self.verify_known(key, path)? {
            return Ok(true);
        }

        info!(
            host = %self.host,
            port = self.port,
            "unknown host key, adding to known_hosts"
        );
        let learned = match path {
            Some(path) => known_hosts::learn_known_hosts_path(&self.host, self.port, key, path),
            None => known_hosts::learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learned {
            // the key is still accepted for this session
            warn!(host = %self.host, error = %e, "failed to record host key");
        }
        Ok(true)
    }
}

impl client::Handler for ClientHandler {
    type Error = HandlerError;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::AcceptAny => Ok(true),
            HostKeyPolicy::KnownHosts => {
                if self.verify_known(server_public_key, None)? {
                    Ok(true)
                } else {
                    Err(self.rejected("host is not in ~/.ssh/known_hosts"))
                }
            }
            HostKeyPolicy::KnownHostsFile(path) => {
                if self.verify_known(server_public_key, Some(path))? {
                    Ok(true)
                } else {
                    Err(self.rejected(format!("host is not in {}", path.display())))
                }
            }
            HostKeyPolicy::TrustOnFirstUse => self.trust_on_first_use(server_public_key, None),
            HostKeyPolicy::TrustOnFirstUseFile(path) => {
                self.trust_on_first_use(server_public_key, Some(path))
            }
        }
    }
}
