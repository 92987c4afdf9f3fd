//! Connection handle owning at most one session to one remote host

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConnectionConfig, HostKeyPolicy};
use crate::credential::Credential;
use crate::error::SshError;
use crate::result::CommandOutput;
use crate::ssh::RusshConnector;
use crate::traits::{Connector, RemoteSession};

/// Future returned by the body passed to [`SshClient::scoped`]
pub type ScopedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SshError>> + Send + 'a>>;

/// SSH connection handle
///
/// Created from configuration only; the session is opened on [`connect`]
/// or lazily by the first [`execute_command`], and can be closed and
/// reopened any number of times. Mutating operations take `&mut self`, so
/// a handle is never driven from two tasks at once.
///
/// [`connect`]: SshClient::connect
/// [`execute_command`]: SshClient::execute_command
pub struct SshClient<C: Connector = RusshConnector> {
    /// Connection configuration
    config: ConnectionConfig,
    /// Opens new sessions
    connector: C,
    /// Live session, if any
    session: Option<C::Session>,
}

impl<C: Connector> std::fmt::Debug for SshClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SshClient<RusshConnector> {
    /// Create a client that connects with russh
    ///
    /// No network I/O happens until the first connect.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, RusshConnector::new())
    }
}

impl<C: Connector> SshClient<C> {
    /// Create a client that opens sessions through `connector`
    pub fn with_connector(config: ConnectionConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            session: None,
        }
    }

    /// Get connection config
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// True iff a session exists and its transport reports active
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(RemoteSession::is_active)
    }

    /// Open and authenticate a session, unless one is already active
    ///
    /// # Errors
    /// Returns `SshError::Config` for a bad configuration, `SshError::Timeout`
    /// if the transport is not up within the connect timeout, and whatever
    /// the connector reports otherwise. The client stays disconnected on error.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn connect(&mut self) -> Result<(), SshError> {
        if self.is_connected() {
            info!(host = %self.config.host, "already connected, reusing the session");
            return Ok(());
        }

        // a session whose transport died is discarded, not reused
        self.session = None;

        let credential = match self
            .config
            .validate()
            .and_then(|()| Credential::from_config(&self.config))
        {
            Ok(credential) => credential,
            Err(e) => {
                error!(host = %self.config.host, error = %e, "invalid SSH configuration");
                return Err(e);
            }
        };

        if self.config.host_key_policy == HostKeyPolicy::AcceptAny {
            warn!(
                host = %self.config.host,
                "host key verification disabled, accepting any server key"
            );
        }

        info!(
            host = %self.config.host,
            port = self.config.port,
            user = %self.config.user,
            method = credential.method(),
            "connecting to SSH"
        );

        let connect_timeout = self.config.connect_timeout();
        let result = match timeout(
            connect_timeout,
            self.connector.connect(&self.config, &credential),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SshError::Timeout {
                timeout: connect_timeout,
            }),
        };

        match result {
            Ok(session) => {
                info!(
                    host = %self.config.host,
                    port = self.config.port,
                    "successfully connected"
                );
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                match &e {
                    SshError::AuthenticationFailed(_) | SshError::Key(_) => error!(
                        host = %self.config.host,
                        error = %e,
                        "authentication failed, check credentials or key file"
                    ),
                    SshError::Protocol(_) | SshError::HostKeyRejected { .. } => error!(
                        host = %self.config.host,
                        error = %e,
                        "SSH error while connecting"
                    ),
                    _ => error!(
                        host = %self.config.host,
                        error = %e,
                        "unexpected error while connecting"
                    ),
                }
                Err(e)
            }
        }
    }

    /// Run a command with the configured default timeout
    ///
    /// # Errors
    /// See [`SshClient::execute_command_with_timeout`]
    pub async fn execute_command(&mut self, command: &str) -> Result<CommandOutput, SshError> {
        let command_timeout = self.config.command_timeout();
        self.execute_command_with_timeout(command, command_timeout)
            .await
    }

    /// Run a command on the remote host, connecting first if needed
    ///
    /// A non-zero exit code is returned as a normal result. Transient errors
    /// (I/O, timeout, dropped session) close the session, reconnect and try
    /// again, up to `max_attempts` attempts in total.
    ///
    /// # Errors
    /// Returns connect errors as-is, protocol errors without retrying, and
    /// the last transient error once attempts are exhausted
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn execute_command_with_timeout(
        &mut self,
        command: &str,
        timeout_duration: Duration,
    ) -> Result<CommandOutput, SshError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if !self.is_connected() {
                self.connect().await?;
            }

            match self.run_once(command, timeout_duration).await {
                Ok(output) => {
                    if output.success() {
                        info!(
                            host = %self.config.host,
                            command = %command,
                            duration = ?output.duration,
                            "command executed successfully"
                        );
                    } else {
                        warn!(
                            host = %self.config.host,
                            command = %command,
                            status = output.exit_code,
                            "command exited with non-zero status"
                        );
                    }
                    return Ok(output);
                }
                Err(e) if !e.is_retryable() => {
                    error!(
                        host = %self.config.host,
                        error = %e,
                        "SSH error while executing command"
                    );
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        host = %self.config.host,
                        attempt,
                        max_attempts,
                        error = %e,
                        "error executing command"
                    );
                    self.close().await;

                    if attempt >= max_attempts {
                        return Err(e);
                    }
                    attempt += 1;
                    warn!(host = %self.config.host, attempt, "reconnecting to retry command");
                }
            }
        }
    }

    async fn run_once(
        &mut self,
        command: &str,
        timeout_duration: Duration,
    ) -> Result<CommandOutput, SshError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SshError::Disconnected("no active session".to_string()))?;

        debug!(command = %command, timeout = ?timeout_duration, "executing remote command");

        match timeout(timeout_duration, session.exec(command)).await {
            Ok(result) => result,
            Err(_) => Err(SshError::Timeout {
                timeout: timeout_duration,
            }),
        }
    }

    /// Close the session if there is one
    ///
    /// Never fails: a close error is logged and the client is left
    /// disconnected either way.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        match session.close().await {
            Ok(()) => info!(host = %self.config.host, "SSH connection closed"),
            Err(e) => error!(
                host = %self.config.host,
                error = %e,
                "error while closing SSH connection"
            ),
        }
    }

    /// Connect, run `f`, then close on every exit path
    ///
    /// ```no_run
    /// # async fn demo() -> Result<(), sshutils::SshError> {
    /// use sshutils::{ConnectionConfig, SshClient};
    ///
    /// let mut client = SshClient::new(ConnectionConfig::new("10.0.0.5", "deploy").with_password("pw"));
    /// let output = client
    ///     .scoped(|c| Box::pin(async move { c.execute_command("uptime").await }))
    ///     .await?;
    /// println!("{}", output.stdout);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns the connect error, or whatever `f` returns
    pub async fn scoped<T, F>(&mut self, f: F) -> Result<T, SshError>
    where
        F: for<'a> FnOnce(&'a mut Self) -> ScopedFuture<'a, T>,
    {
        self.connect().await?;
        let result = f(self).await;
        self.close().await;
        result
    }
}

impl<C: Connector> Drop for SshClient<C> {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            debug!(host = %self.config.host, "dropping client with a live session");
        }
    }
}
