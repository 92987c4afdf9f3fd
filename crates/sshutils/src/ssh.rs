//! SSH transport built on the russh crate

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tracing::{debug, instrument};

use crate::config::ConnectionConfig;
use crate::credential::{Credential, check_key_file};
use crate::error::SshError;
use crate::host_key::ClientHandler;
use crate::result::CommandOutput;
use crate::traits::{Connector, RemoteSession};

/// Extended data stream number for stderr
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Connector that opens real SSH sessions with russh
#[derive(Debug, Clone, Default)]
pub struct RusshConnector;

impl RusshConnector {
    /// Create a new connector
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for RusshConnector {
    type Session = RusshSession;

    #[instrument(skip_all, fields(host = %config.host, port = config.port))]
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
    ) -> Result<RusshSession, SshError> {
        let ssh_config = Arc::new(client::Config::default());
        let handler = ClientHandler::new(
            config.host.clone(),
            config.port,
            config.host_key_policy.clone(),
        );

        let mut handle = client::connect(ssh_config, (config.host.as_str(), config.port), handler)
            .await
            .map_err(SshError::from)?;

        debug!(method = credential.method(), "transport open, authenticating");

        let auth_res = match credential {
            Credential::Password(password) => handle
                .authenticate_password(config.user.clone(), password.clone())
                .await
                .map_err(SshError::from)?,
            Credential::KeyFile(path) => {
                check_key_file(path)?;
                let key_pair =
                    load_secret_key(path, None).map_err(|e| SshError::Key(e.to_string()))?;

                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                handle
                    .authenticate_publickey(
                        config.user.clone(),
                        PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                    )
                    .await
                    .map_err(SshError::from)?
            }
        };

        if !auth_res.success() {
            return Err(SshError::AuthenticationFailed(format!(
                "{} authentication rejected for {}@{}",
                credential.method(),
                config.user,
                config.host
            )));
        }

        Ok(RusshSession {
            host: config.host.clone(),
            handle,
        })
    }
}

/// An authenticated russh session
pub struct RusshSession {
    host: String,
    handle: client::Handle<ClientHandler>,
}

impl std::fmt::Debug for RusshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshSession")
            .field("host", &self.host)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteSession for RusshSession {
    #[instrument(skip(self, command), fields(host = %self.host))]
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SshError> {
        let start = Instant::now();

        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut exit_code = -1;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // exit-status may arrive after EOF, so drain until the channel closes
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    stderr.extend_from_slice(&data);
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = exit_status.cast_signed();
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        let output = CommandOutput::from_raw(&stdout, &stderr, exit_code, start.elapsed());

        debug!(
            status = output.exit_code,
            duration = ?output.duration,
            "remote command completed"
        );

        Ok(output)
    }

    fn is_active(&self) -> bool {
        !self.handle.is_closed()
    }

    async fn close(&mut self) -> Result<(), SshError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}
