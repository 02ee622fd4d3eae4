//! Command-line and environment configuration

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tailnode_localapi::DEFAULT_SOCKET_PATH;

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Advertise a Node's pod CIDRs from the local Tailscale daemon
#[derive(Parser, Clone, Debug)]
#[command(name = "tailnode-controller", version)]
pub struct Config {
    /// Name of the local Node to watch in apiserver
    #[arg(long, env = "NODE_NAME")]
    pub node: String,

    /// Path of the tailscaled LocalAPI socket
    #[arg(long, env = "TAILSCALE_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    pub tailscale_socket: PathBuf,

    /// Timeout in seconds for each LocalAPI request
    #[arg(
        long = "localapi-timeout",
        env = "LOCALAPI_TIMEOUT_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub localapi_timeout_secs: u64,

    /// Address for the /healthz, /readyz and /metrics endpoints; disabled when unset
    #[arg(long, env = "HEALTH_BIND_ADDR")]
    pub health_bind_addr: Option<SocketAddr>,

    /// Pod name reported as the event source instance
    #[arg(long, env = "POD_NAME")]
    pub pod_name: Option<String>,

    /// Enable debug logging; any non-empty `DEBUG` value turns it on
    #[arg(long, env = "DEBUG", value_parser = debug_enabled)]
    pub debug: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// `DEBUG=0` and `DEBUG=false` still enable debug logging
fn debug_enabled(value: &str) -> Result<bool, Infallible> {
    Ok(!value.is_empty())
}

impl Config {
    /// Reject values clap cannot catch on its own
    pub fn validate(&self) -> Result<()> {
        if self.node.trim().is_empty() {
            bail!("--node not specified");
        }
        Ok(())
    }

    pub fn localapi_timeout(&self) -> Duration {
        Duration::from_secs(self.localapi_timeout_secs)
    }
}
