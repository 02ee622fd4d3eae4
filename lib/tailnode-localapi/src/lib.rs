//! Tailscale LocalAPI client
//!
//! Implements [`tailnode_core::DaemonControl`] on top of the daemon's
//! HTTP API served over its unix socket.

pub mod client;
pub mod error;
pub mod wire;

pub use client::{LocalClient, DEFAULT_SOCKET_PATH};
pub use error::{LocalApiError, Result};
pub use wire::{MaskedPrefs, Prefs, Status};
