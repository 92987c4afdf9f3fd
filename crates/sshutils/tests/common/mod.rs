//! Test connectors: a local `sh -c` runner and a scripted mock

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use sshutils::{CommandOutput, ConnectionConfig, Connector, Credential, RemoteSession, SshError};

/// Password the mock and local connectors accept
pub const GOOD_PASSWORD: &str = "p";

fn check_credential(config: &ConnectionConfig, credential: &Credential) -> Result<(), SshError> {
    match credential {
        Credential::Password(p) if p == GOOD_PASSWORD => Ok(()),
        Credential::Password(_) => Err(SshError::AuthenticationFailed(format!(
            "password rejected for {}@{}",
            config.user, config.host
        ))),
        Credential::KeyFile(path) if path.exists() => Ok(()),
        Credential::KeyFile(path) => Err(SshError::Key(format!("{} not found", path.display()))),
    }
}

/// Runs commands on this machine through `sh -c`
#[derive(Debug, Clone, Default)]
pub struct LocalConnector {
    pub connects: Arc<AtomicUsize>,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for LocalConnector {
    type Session = LocalSession;

    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
    ) -> Result<LocalSession, SshError> {
        check_credential(config, credential)?;
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(LocalSession { active: true })
    }
}

#[derive(Debug)]
pub struct LocalSession {
    active: bool,
}

#[async_trait]
impl RemoteSession for LocalSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SshError> {
        let start = Instant::now();

        // kill_on_drop so a timed-out command does not outlive the test
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput::from_raw(
            &output.stdout,
            &output.stderr,
            output.status.code().unwrap_or(-1),
            start.elapsed(),
        ))
    }

    fn is_active(&self) -> bool {
        self.active
    }

    async fn close(&mut self) -> Result<(), SshError> {
        self.active = false;
        Ok(())
    }
}

/// Counters and scripted results shared by a `MockConnector` and its sessions
#[derive(Debug, Default)]
pub struct MockState {
    pub connects: usize,
    pub closes: usize,
    pub execs: Vec<String>,
    /// Results handed out by `connect`, in order; empty means success
    pub connect_results: VecDeque<Result<(), SshError>>,
    /// Results handed out by `exec`, in order; empty means `("ok", "", 0)`
    pub exec_results: VecDeque<Result<CommandOutput, SshError>>,
    /// Make `close` fail
    pub fail_close: bool,
    /// Sessions report inactive once this is set
    pub transport_dead: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    pub state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_exec(&self, result: Result<CommandOutput, SshError>) {
        self.state.lock().unwrap().exec_results.push_back(result);
    }

    pub fn push_connect(&self, result: Result<(), SshError>) {
        self.state.lock().unwrap().connect_results.push_back(result);
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn execs(&self) -> Vec<String> {
        self.state.lock().unwrap().execs.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: &Credential,
    ) -> Result<MockSession, SshError> {
        check_credential(config, credential)?;

        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if let Some(result) = state.connect_results.pop_front() {
            result?;
        }
        state.transport_dead = false;

        Ok(MockSession {
            state: Arc::clone(&self.state),
            open: true,
        })
    }
}

#[derive(Debug)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
    open: bool,
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, SshError> {
        let mut state = self.state.lock().unwrap();
        state.execs.push(command.to_string());
        state
            .exec_results
            .pop_front()
            .unwrap_or_else(|| Ok(output("ok", "", 0)))
    }

    fn is_active(&self) -> bool {
        self.open && !self.state.lock().unwrap().transport_dead
    }

    async fn close(&mut self) -> Result<(), SshError> {
        self.open = false;
        let mut state = self.state.lock().unwrap();
        state.closes += 1;
        if state.fail_close {
            return Err(SshError::Io("broken pipe".to_string()));
        }
        Ok(())
    }
}

pub fn output(stdout: &str, stderr: &str, exit_code: i32) -> CommandOutput {
    CommandOutput::from_raw(
        stdout.as_bytes(),
        stderr.as_bytes(),
        exit_code,
        Duration::from_millis(1),
    )
}

pub fn password_config() -> ConnectionConfig {
    ConnectionConfig::new("h", "u").with_password(GOOD_PASSWORD)
}
