use anyhow::{Context as _, Result};
use clap::Parser;
use kube::Client;
use std::sync::Arc;
use tailnode_core::RouteReconciler;
use tailnode_kube::{KubeEventRecorder, KubeNodeSource};
use tailnode_localapi::LocalClient;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

mod config;
mod controller;
mod health;
mod logging;
mod metrics;

use config::Config;
use controller::{Context, NodeRouteController};
use health::HealthState;
use metrics::ControllerMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;
    logging::init(config.log_format, config.debug);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        node = %config.node,
        "Starting tailnode-controller..."
    );

    let localapi = LocalClient::new(&config.tailscale_socket)
        .with_timeout(config.localapi_timeout());
    let status = localapi
        .status()
        .await
        .context("error checking tailscale daemon status")?;
    match &status.current_tailnet {
        Some(tailnet) => info!(
            tailnet = %tailnet.name,
            version = %status.version,
            "Connected to local Tailscale daemon"
        ),
        None => warn!(
            backend_state = %status.backend_state,
            "Tailscale daemon is not connected to a tailnet yet"
        ),
    }

    let client = Client::try_default()
        .await
        .context("error creating Kubernetes client")?;

    let metrics = Arc::new(ControllerMetrics::new()?);
    let health = Arc::new(HealthState::new(metrics.clone()));
    if let Some(addr) = config.health_bind_addr {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("error binding health server to {}", addr))?;
        let health = health.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(listener, health).await {
                error!("Health server error: {}", e);
            }
        });
    }

    let mut recorder = KubeEventRecorder::new(client.clone());
    if let Some(pod_name) = &config.pod_name {
        recorder = recorder.with_instance(pod_name.clone());
    }

    let reconciler = RouteReconciler::new(
        config.node.clone(),
        Arc::new(KubeNodeSource::new(client.clone())),
        Arc::new(localapi),
        Arc::new(recorder),
    );
    let controller = NodeRouteController::new(client, Arc::new(Context::new(reconciler, metrics)));

    health.mark_ready();

    // Dropping the controller future cancels any in-flight pass
    tokio::select! {
        result = controller.run() => {
            result?;
            warn!("Node watch ended");
        }
        result = shutdown_signal() => {
            result?;
            info!("Shutdown signal received, exiting...");
        }
    }

    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
