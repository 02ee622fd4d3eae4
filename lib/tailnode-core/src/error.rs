use crate::{display_ranges, AddressRange, AddressRangeError};
use thiserror::Error;

/// Boxed transport error from a collaborator
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Failure reading from the cluster API
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("node {0} not found")]
    NotFound(String),

    #[error("cluster API request failed: {0}")]
    Transport(#[source] BoxError),
}

/// Failure talking to the daemon's control API
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("daemon unreachable: {0}")]
    Transport(#[source] BoxError),

    #[error("daemon rejected request: {0}")]
    Rejected(String),

    #[error("unexpected daemon response: {0}")]
    InvalidResponse(String),
}

/// Reportable errors from a reconciliation pass. Each variant names the node
/// and the collaborator call that failed.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("error checking tailscale daemon status for node {node}: {source}")]
    DaemonStatus {
        node: String,
        #[source]
        source: DaemonError,
    },

    #[error("failed to look up node {node}: {source}")]
    NodeLookup {
        node: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to get current routes from local tailscale daemon for node {node}: {source}")]
    DaemonPreferences {
        node: String,
        #[source]
        source: DaemonError,
    },

    #[error("failed to parse pod CIDR {raw:?} of node {node}: {source}")]
    InvalidRange {
        node: String,
        raw: String,
        #[source]
        source: AddressRangeError,
    },

    #[error("failed to advertise new CIDRs {} for node {node}: {source}", display_ranges(.ranges))]
    Advertise {
        node: String,
        ranges: Vec<AddressRange>,
        #[source]
        source: DaemonError,
    },
}

impl ReconcileError {
    /// Node the failed pass was reconciling
    pub fn node(&self) -> &str {
        match self {
            ReconcileError::DaemonStatus { node, .. }
            | ReconcileError::NodeLookup { node, .. }
            | ReconcileError::DaemonPreferences { node, .. }
            | ReconcileError::InvalidRange { node, .. }
            | ReconcileError::Advertise { node, .. } => node,
        }
    }

    /// Short label for the failed step, used in logs and metrics
    pub fn step(&self) -> &'static str {
        match self {
            ReconcileError::DaemonStatus { .. } => "daemon_status",
            ReconcileError::NodeLookup { .. } => "node_lookup",
            ReconcileError::DaemonPreferences { .. } => "daemon_preferences",
            ReconcileError::InvalidRange { .. } => "invalid_range",
            ReconcileError::Advertise { .. } => "advertise",
        }
    }
}
