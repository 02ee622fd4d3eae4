//! Health, readiness and metrics endpoints

use crate::metrics::ControllerMetrics;
use anyhow::Result;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Shared state behind the health endpoints
pub struct HealthState {
    ready: AtomicBool,
    metrics: Arc<ControllerMetrics>,
}

impl HealthState {
    pub fn new(metrics: Arc<ControllerMetrics>) -> Self {
        Self {
            ready: AtomicBool::new(false),
            metrics,
        }
    }

    /// Mark the controller as started
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Serve health endpoints until the listener fails
pub async fn serve(listener: TcpListener, state: Arc<HealthState>) -> Result<()> {
    info!("Health server listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Error accepting health connection: {}", e);
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(respond(req.method(), req.uri().path(), &state)) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving health connection from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Build the response for a health request
pub fn respond(method: &Method, path: &str, state: &HealthState) -> Response<Full<Bytes>> {
    if *method != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n".to_string());
    }

    match path {
        "/healthz" => text(StatusCode::OK, "OK\n".to_string()),
        "/readyz" if state.is_ready() => text(StatusCode::OK, "OK\n".to_string()),
        "/readyz" => text(StatusCode::SERVICE_UNAVAILABLE, "not ready\n".to_string()),
        "/metrics" => match state.metrics.gather() {
            Ok(body) => {
                let mut response = text(StatusCode::OK, body);
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; version=0.0.4"),
                );
                response
            }
            Err(e) => {
                warn!("Failed to gather metrics: {}", e);
                text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to gather metrics\n".to_string(),
                )
            }
        },
        _ => text(StatusCode::NOT_FOUND, "not found\n".to_string()),
    }
}

fn text(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}
