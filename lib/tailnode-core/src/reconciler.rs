//! Route reconciliation: converge the daemon's advertised routes toward the
//! pod CIDRs of the bound node.
//!
//! A pass reads the daemon status, the node record and the daemon
//! preferences, in that order, stopping at the first failure. If the node has
//! ranges the daemon does not advertise yet, they are appended to the
//! advertised list in one masked update and an event is published. Routes
//! are never removed.
//!
//! A pass holds no state between calls and is safe to drop at any await
//! point; an update already sent to the daemon is not retracted.

use crate::{
    display_ranges, AddressRange, DaemonControl, DaemonPreferences, EventSink, IpNetwork,
    NodeRecord, NodeSource, PreferencesUpdate, ReconcileError, Result, RoutesAdvertised,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Delay before retrying when the daemon is not yet running
pub const DAEMON_NOT_RUNNING_RETRY: Duration = Duration::from_secs(5);

/// Result of a successful pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// The daemon was not running; try again after the delay
    Deferred { retry_after: Duration },
    /// Every node range is already advertised
    Unchanged,
    /// These ranges were appended to the advertised routes
    Advertised { added: Vec<AddressRange> },
}

impl PassOutcome {
    /// Delay after which the scheduler should run another pass, if any
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            PassOutcome::Deferred { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PassOutcome::Deferred { .. } => "deferred",
            PassOutcome::Unchanged => "unchanged",
            PassOutcome::Advertised { .. } => "advertised",
        }
    }
}

/// Reconciles the daemon's advertised routes for a single node.
///
/// Bound to one node name for its lifetime.
pub struct RouteReconciler {
    node_name: String,
    nodes: Arc<dyn NodeSource>,
    daemon: Arc<dyn DaemonControl>,
    events: Arc<dyn EventSink>,
}

impl RouteReconciler {
    pub fn new(
        node_name: impl Into<String>,
        nodes: Arc<dyn NodeSource>,
        daemon: Arc<dyn DaemonControl>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            nodes,
            daemon,
            events,
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Run one reconciliation pass for `node`.
    ///
    /// Requests for any node other than the bound one are ignored.
    #[instrument(skip(self), fields(bound = %self.node_name))]
    pub async fn reconcile_once(&self, node: &str) -> Result<PassOutcome> {
        if node != self.node_name {
            warn!("ignoring reconcile request for unbound node");
            return Ok(PassOutcome::Unchanged);
        }

        let status = self
            .daemon
            .status()
            .await
            .map_err(|source| ReconcileError::DaemonStatus {
                node: node.to_string(),
                source,
            })?;
        if !status.backend_state.is_running() {
            info!(
                state = %status.backend_state,
                retry_after = ?DAEMON_NOT_RUNNING_RETRY,
                "tailscale daemon not currently running, requeuing"
            );
            return Ok(PassOutcome::Deferred {
                retry_after: DAEMON_NOT_RUNNING_RETRY,
            });
        }
        debug!(tailnet = ?status.tailnet, "tailscale daemon running");

        let record = self
            .nodes
            .get_node(node)
            .await
            .map_err(|source| ReconcileError::NodeLookup {
                node: node.to_string(),
                source,
            })?;

        let prefs = self
            .daemon
            .preferences()
            .await
            .map_err(|source| ReconcileError::DaemonPreferences {
                node: node.to_string(),
                source,
            })?;

        let wanted = parse_ranges(&record)?;
        let delta = compute_delta(&wanted, &prefs.advertise_routes);
        if delta.is_empty() {
            debug!(
                advertised = prefs.advertise_routes.len(),
                "all pod CIDRs already advertised"
            );
            return Ok(PassOutcome::Unchanged);
        }

        self.advertise(&record, prefs, delta).await
    }

    async fn advertise(
        &self,
        record: &NodeRecord,
        prefs: DaemonPreferences,
        added: Vec<AddressRange>,
    ) -> Result<PassOutcome> {
        info!(
            node = %record.name,
            added = %display_ranges(&added),
            "node has updated routes"
        );

        let routes = merge_routes(&prefs.advertise_routes, &added);
        let update = PreferencesUpdate::advertise_routes(routes);
        self.daemon
            .update_preferences(&update)
            .await
            .map_err(|source| ReconcileError::Advertise {
                node: record.name.clone(),
                ranges: added.clone(),
                source,
            })?;

        self.events
            .routes_advertised(&RoutesAdvertised {
                node: record.name.clone(),
                node_uid: record.uid.clone(),
                added: added.clone(),
            })
            .await;

        Ok(PassOutcome::Advertised { added })
    }
}

/// Parse every pod CIDR of a node. The first malformed entry fails the
/// whole record.
pub fn parse_ranges(record: &NodeRecord) -> Result<Vec<AddressRange>> {
    record
        .pod_cidrs
        .iter()
        .map(|raw| {
            raw.parse::<AddressRange>()
                .map_err(|source| ReconcileError::InvalidRange {
                    node: record.name.clone(),
                    raw: raw.clone(),
                    source,
                })
        })
        .collect()
}

/// Ranges from `wanted` not present in `advertised`, in `wanted` order.
/// Advertised networks are compared in canonical form. A range repeated in
/// `wanted` is returned once.
pub fn compute_delta(wanted: &[AddressRange], advertised: &[IpNetwork]) -> Vec<AddressRange> {
    let advertised: Vec<AddressRange> =
        advertised.iter().copied().map(AddressRange::from).collect();
    let mut delta: Vec<AddressRange> = Vec::new();
    for range in wanted {
        if !advertised.contains(range) && !delta.contains(range) {
            delta.push(*range);
        }
    }
    delta
}

/// The advertised list, unchanged, followed by the delta; never reordered
/// or sorted.
pub fn merge_routes(advertised: &[IpNetwork], delta: &[AddressRange]) -> Vec<IpNetwork> {
    let mut routes = Vec::with_capacity(advertised.len() + delta.len());
    routes.extend_from_slice(advertised);
    routes.extend(delta.iter().copied().map(IpNetwork::from));
    routes
}
