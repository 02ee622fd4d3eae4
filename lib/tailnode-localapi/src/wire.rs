//! JSON bodies exchanged with the Tailscale LocalAPI

use serde::{Deserialize, Serialize};
use tailnode_core::{BackendState, DaemonPreferences, DaemonStatus, IpNetwork, PreferencesUpdate};

/// Response of `GET /localapi/v0/status` (fields we use)
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    #[serde(default)]
    pub version: String,
    pub backend_state: String,
    #[serde(default)]
    pub current_tailnet: Option<TailnetStatus>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TailnetStatus {
    pub name: String,
}

impl From<Status> for DaemonStatus {
    fn from(status: Status) -> Self {
        DaemonStatus {
            backend_state: BackendState::from(status.backend_state.as_str()),
            tailnet: status.current_tailnet.map(|t| t.name),
        }
    }
}

/// Daemon preferences as returned by `GET /localapi/v0/prefs`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Prefs {
    /// `null` when nothing is advertised. Entries are kept exactly as sent
    /// so they can be written back unchanged.
    #[serde(default)]
    pub advertise_routes: Option<Vec<IpNetwork>>,
}

impl From<Prefs> for DaemonPreferences {
    fn from(prefs: Prefs) -> Self {
        DaemonPreferences {
            advertise_routes: prefs.advertise_routes.unwrap_or_default(),
        }
    }
}

/// Body of `PATCH /localapi/v0/prefs`.
///
/// The daemon only applies fields whose `...Set` flag is true.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MaskedPrefs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertise_routes: Option<Vec<IpNetwork>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub advertise_routes_set: bool,
}

impl From<&PreferencesUpdate> for MaskedPrefs {
    fn from(update: &PreferencesUpdate) -> Self {
        MaskedPrefs {
            advertise_routes_set: update.advertise_routes.is_some(),
            advertise_routes: update.advertise_routes.clone(),
        }
    }
}
