//! Route reconciliation engine for tailnode
//!
//! This library provides:
//! - Address range parsing and comparison
//! - The trigger filter deciding which Node changes start a pass
//! - The reconciler that appends missing pod CIDRs to the daemon's
//!   advertised routes
//! - Collaborator traits for the cluster API, the daemon and event sinks

pub mod error;
pub mod filter;
pub mod interfaces;
pub mod model;
pub mod range;
pub mod reconciler;

pub use ipnetwork::IpNetwork;

pub use error::{BoxError, ClusterError, DaemonError, ReconcileError, Result};
pub use filter::TriggerFilter;
pub use interfaces::{DaemonControl, EventSink, NodeSource, NoopEventSink};
pub use model::{
    BackendState, DaemonPreferences, DaemonStatus, NodeRecord, PreferencesUpdate,
    RoutesAdvertised,
};
pub use range::{display_ranges, AddressRange, AddressRangeError};
pub use reconciler::{PassOutcome, RouteReconciler, DAEMON_NOT_RUNNING_RETRY};
