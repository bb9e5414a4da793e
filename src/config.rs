//! Process configuration
//!
//! Every flag has an environment fallback so the plugin can be configured
//! from its Deployment without rewriting the container args.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};

/// Default address for the hook server
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8085";

/// KubeVirt item actions for Velero
#[derive(Parser, Debug, Clone)]
#[command(name = "kubevirt-velero-plugin", version, about, long_about = None)]
pub struct Config {
    /// Address the hook server listens on
    #[arg(long, env = "KVP_LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Seconds a single hook invocation may spend on cluster lookups
    #[arg(long, env = "KVP_HOOK_TIMEOUT_SECS", default_value_t = 60)]
    pub hook_timeout_secs: u64,

    /// Emit JSON log lines
    #[arg(long, env = "KVP_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Plugin subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the item actions over HTTP (default)
    Serve,

    /// Print the registration manifest as YAML and exit
    Manifest,
}

impl Config {
    /// Deadline for one hook invocation
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs)
    }

    /// Subcommand to run, defaulting to `serve`
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
