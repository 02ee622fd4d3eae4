//! Capabilities the reconciler depends on.
//!
//! The engine never constructs these itself; concrete implementations (the
//! Kubernetes API, the Tailscale LocalAPI) are injected at construction so
//! the engine can be exercised against fakes.

use crate::{
    ClusterError, DaemonError, DaemonPreferences, DaemonStatus, NodeRecord, PreferencesUpdate,
    RoutesAdvertised,
};
use async_trait::async_trait;

/// Read access to Node records in the cluster
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// Fetch the current record for a node
    async fn get_node(&self, name: &str) -> Result<NodeRecord, ClusterError>;
}

/// Control API of the local VPN daemon
#[async_trait]
pub trait DaemonControl: Send + Sync {
    /// Current operational state
    async fn status(&self) -> Result<DaemonStatus, DaemonError>;

    /// Current preferences, including the advertised routes
    async fn preferences(&self) -> Result<DaemonPreferences, DaemonError>;

    /// Apply a masked update. The daemon applies it as a single change.
    async fn update_preferences(&self, update: &PreferencesUpdate) -> Result<(), DaemonError>;
}

/// Destination for observability records about applied changes.
///
/// Publishing is best effort: implementations log their own failures.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn routes_advertised(&self, event: &RoutesAdvertised);
}

/// Sink that drops every event
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn routes_advertised(&self, _event: &RoutesAdvertised) {}
}
