//! HTTP client for the Tailscale LocalAPI over the daemon's unix socket

use crate::wire::{MaskedPrefs, Prefs, Status};
use crate::{LocalApiError, Result};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tailnode_core::{
    DaemonControl, DaemonError, DaemonPreferences, DaemonStatus, PreferencesUpdate,
};
use tokio::net::UnixStream;
use tracing::debug;

/// Default location of the tailscaled socket on Linux
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/tailscale/tailscaled.sock";

/// Host header the daemon expects on LocalAPI requests
const LOCALAPI_HOST: &str = "local-tailscaled.sock";

const STATUS_PATH: &str = "/localapi/v0/status";
const PREFS_PATH: &str = "/localapi/v0/prefs";

/// LocalClient talks to a running tailscaled.
///
/// Every request opens its own connection, so a client is cheap to clone
/// and never holds a stale connection across daemon restarts.
#[derive(Clone, Debug)]
pub struct LocalClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl LocalClient {
    /// Create a client for the socket at `socket_path`
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Per-request timeout, covering connect, send and body read
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// `GET /localapi/v0/status`
    pub async fn status(&self) -> Result<Status> {
        let body = self.send(Method::GET, STATUS_PATH, None).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `GET /localapi/v0/prefs`
    pub async fn prefs(&self) -> Result<Prefs> {
        let body = self.send(Method::GET, PREFS_PATH, None).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `PATCH /localapi/v0/prefs`; returns the resulting preferences
    pub async fn edit_prefs(&self, prefs: &MaskedPrefs) -> Result<Prefs> {
        let payload = serde_json::to_vec(prefs)?;
        let body = self.send(Method::PATCH, PREFS_PATH, Some(payload)).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Bytes> {
        tokio::time::timeout(self.timeout, self.round_trip(method, path, body))
            .await
            .map_err(|_| LocalApiError::Timeout(self.timeout))?
    }

    async fn round_trip(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Bytes> {
        debug!("LocalAPI {} {}", method, path);

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| LocalApiError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;

        let (mut sender, conn) = http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("LocalAPI connection error: {}", e);
            }
        });

        let mut request = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, LOCALAPI_HOST);
        if body.is_some() {
            request = request.header(CONTENT_TYPE, "application/json");
        }
        let request = request.body(Full::new(Bytes::from(body.unwrap_or_default())))?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();

        if !status.is_success() {
            return Err(LocalApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }
        Ok(bytes)
    }
}

impl Default for LocalClient {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_PATH)
    }
}

#[async_trait]
impl DaemonControl for LocalClient {
    async fn status(&self) -> std::result::Result<DaemonStatus, DaemonError> {
        Ok(LocalClient::status(self).await?.into())
    }

    async fn preferences(&self) -> std::result::Result<DaemonPreferences, DaemonError> {
        Ok(self.prefs().await?.into())
    }

    async fn update_preferences(
        &self,
        update: &PreferencesUpdate,
    ) -> std::result::Result<(), DaemonError> {
        self.edit_prefs(&MaskedPrefs::from(update)).await?;
        Ok(())
    }
}
