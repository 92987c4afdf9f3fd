//! sshutils: connect / execute / close over SSH
//!
//! A thin wrapper around russh: one [`SshClient`] owns at most one session to
//! one host, connects lazily, retries transient command failures a bounded
//! number of times, and logs everything through `tracing`.

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
mod host_key;
pub mod result;
pub mod ssh;
pub mod traits;

pub use client::{ScopedFuture, SshClient};
pub use config::{ConnectionConfig, HostKeyPolicy};
pub use credential::Credential;
pub use error::SshError;
pub use result::CommandOutput;
pub use ssh::{RusshConnector, RusshSession};
pub use traits::{Connector, RemoteSession};
