//! Records read from the cluster and the daemon during a reconciliation pass

use crate::AddressRange;
use ipnetwork::IpNetwork;
use std::fmt;

/// The subset of a Kubernetes Node the engine cares about
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: String,
    pub uid: Option<String>,
    /// Pod CIDRs in the order the cluster assigned them, unparsed
    pub pod_cidrs: Vec<String>,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>, pod_cidrs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            uid: None,
            pod_cidrs,
        }
    }
}

/// Coarse operational state reported by the daemon
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendState {
    NoState,
    NeedsLogin,
    NeedsMachineAuth,
    Stopped,
    Starting,
    Running,
    Other(String),
}

impl BackendState {
    pub fn is_running(&self) -> bool {
        matches!(self, BackendState::Running)
    }
}

impl From<&str> for BackendState {
    fn from(s: &str) -> Self {
        match s {
            "NoState" => BackendState::NoState,
            "NeedsLogin" => BackendState::NeedsLogin,
            "NeedsMachineAuth" => BackendState::NeedsMachineAuth,
            "Stopped" => BackendState::Stopped,
            "Starting" => BackendState::Starting,
            "Running" => BackendState::Running,
            other => BackendState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendState::NoState => "NoState",
            BackendState::NeedsLogin => "NeedsLogin",
            BackendState::NeedsMachineAuth => "NeedsMachineAuth",
            BackendState::Stopped => "Stopped",
            BackendState::Starting => "Starting",
            BackendState::Running => "Running",
            BackendState::Other(other) => other,
        };
        f.write_str(s)
    }
}

/// Daemon status as seen at the start of a pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DaemonStatus {
    pub backend_state: BackendState,
    /// Name of the tailnet the daemon is connected to, if any
    pub tailnet: Option<String>,
}

/// The daemon preferences the engine reads
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DaemonPreferences {
    /// Advertised routes exactly as the daemon reported them
    pub advertise_routes: Vec<IpNetwork>,
}

/// A masked preference update. Only fields set to `Some` are changed on the
/// daemon; everything else is left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreferencesUpdate {
    pub advertise_routes: Option<Vec<IpNetwork>>,
}

impl PreferencesUpdate {
    pub fn advertise_routes(routes: Vec<IpNetwork>) -> Self {
        Self {
            advertise_routes: Some(routes),
        }
    }
}

/// Observation emitted after new routes were advertised for a node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutesAdvertised {
    pub node: String,
    pub node_uid: Option<String>,
    pub added: Vec<AddressRange>,
}

impl RoutesAdvertised {
    /// Event reason attached to the Kubernetes Event
    pub const REASON: &'static str = "PodCIDRsAdvertised";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_state_round_trip_names() {
        for name in ["NoState", "NeedsLogin", "NeedsMachineAuth", "Stopped", "Starting", "Running"] {
            assert_eq!(BackendState::from(name).to_string(), name);
        }
        assert_eq!(
            BackendState::from("InUseOtherUser"),
            BackendState::Other("InUseOtherUser".to_string())
        );
    }

    #[test]
    fn test_only_running_is_running() {
        assert!(BackendState::Running.is_running());
        assert!(!BackendState::Starting.is_running());
        assert!(!BackendState::Other("running".to_string()).is_running());
    }

    #[test]
    fn test_preferences_update_mask() {
        assert_eq!(PreferencesUpdate::default().advertise_routes, None);
        let update = PreferencesUpdate::advertise_routes(vec![]);
        assert_eq!(update.advertise_routes, Some(vec![]));
    }
}
