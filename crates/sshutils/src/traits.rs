//! Transport seam between `SshClient` and the SSH library

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::credential::Credential;
use crate::error::SshError;
use crate::result::CommandOutput;

/// Opens authenticated sessions to a remote host
#[async_trait]
pub trait Connector: Send + Sync {
    /// Session type produced by this connector
    type Session: RemoteSession;

    /// Open a transport, verify the host key and authenticate
    ///
    /// Timeouts are applied by the caller.
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
    ) -> Result<Self::Session, SshError>;
}

/// A live, authenticated session
#[async_trait]
pub trait RemoteSession: Send {
    /// Run a command to completion and collect its output
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SshError>;

    /// Whether the transport still reports active
    fn is_active(&self) -> bool;

    /// Gracefully shut the session down
    async fn close(&mut self) -> Result<(), SshError>;
}
