//! sshutils CLI
//!
//! Run a command on a remote host over SSH, or check that a host is reachable

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use sshutils::{HostKeyPolicy, SshClient};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;

use config::{Config, ConnectionOverrides};

#[derive(Parser, Debug)]
#[command(name = "sshutils", version)]
#[command(about = "Run commands on remote hosts over SSH", long_about = None)]
struct Cli {
    /// Path to a config file (defaults to $SSHUTILS_CONFIG, ./sshutils.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command and exit with its exit code
    Exec {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Command to run in the remote shell
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Connect, authenticate and disconnect
    Check {
        #[command(flatten)]
        conn: ConnectionArgs,
    },
}

#[derive(Args, Debug, Default)]
struct ConnectionArgs {
    /// Remote host
    #[arg(long, short = 'H')]
    host: Option<String>,

    /// Login user
    #[arg(long, short = 'u')]
    user: Option<String>,

    /// Password authentication
    #[arg(long, conflicts_with = "key_path")]
    password: Option<String>,

    /// Private key file for public key authentication
    #[arg(long, short = 'i')]
    key_path: Option<PathBuf>,

    /// Remote port
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Seconds allowed for opening and authenticating the connection
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout: Option<u64>,

    /// Command timeout in seconds
    #[arg(long, short = 't', value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Total attempts for a command that fails with a transient error
    #[arg(long)]
    attempts: Option<u32>,

    /// Verify the host key against this known_hosts file
    #[arg(long, conflicts_with = "strict")]
    known_hosts: Option<PathBuf>,

    /// Verify the host key against ~/.ssh/known_hosts
    #[arg(long, conflicts_with = "tofu")]
    strict: bool,

    /// Record keys of unknown hosts (in ~/.ssh/known_hosts, or the --known-hosts file)
    #[arg(long)]
    tofu: bool,
}

impl ConnectionArgs {
    fn host_key_policy(&self) -> Option<HostKeyPolicy> {
        match (&self.known_hosts, self.tofu) {
            (Some(path), true) => Some(HostKeyPolicy::TrustOnFirstUseFile(path.clone())),
            (Some(path), false) => Some(HostKeyPolicy::KnownHostsFile(path.clone())),
            (None, true) => Some(HostKeyPolicy::TrustOnFirstUse),
            (None, false) if self.strict => Some(HostKeyPolicy::KnownHosts),
            (None, false) => None,
        }
    }

    fn into_overrides(self) -> ConnectionOverrides {
        let host_key_policy = self.host_key_policy();
        ConnectionOverrides {
            host: self.host,
            user: self.user,
            password: self.password,
            key_path: self.key_path,
            port: self.port,
            connect_timeout_secs: self.connect_timeout,
            command_timeout_secs: self.timeout,
            max_attempts: self.attempts,
            host_key_policy,
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Map a remote exit code onto a process exit code
fn process_exit_code(remote: i32) -> i32 {
    if (0..=255).contains(&remote) {
        remote
    } else {
        255
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let file_config = Config::load_default(cli.config.as_deref())?;
    init_tracing(&file_config.log_level);

    match cli.command {
        Commands::Exec {
            conn,
            json,
            command,
        } => {
            let config = file_config.connection.resolve(conn.into_overrides())?;
            debug!(?config, "resolved connection config");
            let command = command.join(" ");

            let mut client = SshClient::new(config);
            let output = client
                .scoped(|c| Box::pin(async move { c.execute_command(&command).await }))
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                if !output.stdout.is_empty() {
                    println!("{}", output.stdout);
                }
                if !output.stderr.is_empty() {
                    eprintln!("{}", output.stderr);
                }
            }

            std::process::exit(process_exit_code(output.exit_code));
        }
        Commands::Check { conn } => {
            let config = file_config.connection.resolve(conn.into_overrides())?;
            debug!(?config, "resolved connection config");
            let target = format!("{}@{}:{}", config.user, config.host, config.port);

            let mut client = SshClient::new(config);
            client.scoped(|_| Box::pin(async { Ok(()) })).await?;
            println!("{target}: ok");
        }
    }

    Ok(())
}
