//! Node controller driving route reconciliation

use crate::metrics::ControllerMetrics;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::{Client, ResourceExt};
use kube_runtime::{controller::Action, Controller};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tailnode_core::{PassOutcome, ReconcileError, RouteReconciler, TriggerFilter};
use tailnode_kube::node_triggers;
use tracing::{debug, error, info, warn};

/// First retry delay after a failed pass
const ERROR_BACKOFF_BASE: Duration = Duration::from_secs(5);
/// Upper bound on the retry delay after repeated failures
const ERROR_BACKOFF_MAX: Duration = Duration::from_secs(300);

/// Shared state handed to every reconciliation
pub struct Context {
    pub reconciler: RouteReconciler,
    pub metrics: Arc<ControllerMetrics>,
    /// Consecutive failed passes, reset by any successful one
    failures: AtomicU32,
}

impl Context {
    pub fn new(reconciler: RouteReconciler, metrics: Arc<ControllerMetrics>) -> Self {
        Self {
            reconciler,
            metrics,
            failures: AtomicU32::new(0),
        }
    }
}

/// NodeRouteController watches the bound Node and runs a pass per admitted change
pub struct NodeRouteController {
    client: Client,
    ctx: Arc<Context>,
}

impl NodeRouteController {
    pub fn new(client: Client, ctx: Arc<Context>) -> Self {
        Self { client, ctx }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let node_name = self.ctx.reconciler.node_name().to_string();
        info!(node = %node_name, "Starting Node route reconciliation");

        let (reader, triggers) =
            node_triggers(self.client.clone(), TriggerFilter::new(node_name));

        let mut stream = Controller::for_stream(triggers, reader)
            .run(reconcile, error_policy, self.ctx.clone())
            .boxed();

        while let Some(item) = stream.next().await {
            match item {
                Ok((node, action)) => debug!(node = %node.name, ?action, "Reconciled node"),
                Err(e) => warn!("Error in reconciliation stream: {}", e),
            }
        }

        Ok(())
    }
}

/// Run one pass for the node that triggered it
pub async fn reconcile(node: Arc<Node>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let started = Instant::now();
    let result = ctx.reconciler.reconcile_once(&node.name_any()).await;
    ctx.metrics.observe(&result, started.elapsed());

    let outcome = result?;
    ctx.failures.store(0, Ordering::Relaxed);
    Ok(action_for(&outcome))
}

/// Requeue deferred passes; otherwise wait for the next admitted change
pub fn action_for(outcome: &PassOutcome) -> Action {
    match outcome.requeue_after() {
        Some(delay) => Action::requeue(delay),
        None => Action::await_change(),
    }
}

/// Retry failed passes with exponential backoff
pub fn error_policy(node: Arc<Node>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    let attempt = ctx.failures.fetch_add(1, Ordering::Relaxed);
    let delay = error_backoff(attempt);
    error!(
        node = %node.name_any(),
        step = error.step(),
        retry_after = ?delay,
        "reconciliation failed: {}",
        error
    );
    Action::requeue(delay)
}

/// Delay before retry `attempt` (zero-based): 5s doubling up to 5 minutes
pub fn error_backoff(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.min(10);
    ERROR_BACKOFF_BASE
        .saturating_mul(factor)
        .min(ERROR_BACKOFF_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::sync::Mutex;
    use tailnode_core::{
        BackendState, ClusterError, DaemonControl, DaemonError, DaemonPreferences, DaemonStatus,
        IpNetwork, NodeRecord, NodeSource, NoopEventSink, PreferencesUpdate,
    };

    struct StaticNodes(Option<NodeRecord>);

    #[async_trait]
    impl NodeSource for StaticNodes {
        async fn get_node(&self, name: &str) -> Result<NodeRecord, ClusterError> {
            self.0
                .clone()
                .ok_or_else(|| ClusterError::NotFound(name.to_string()))
        }
    }

    struct StaticDaemon {
        state: BackendState,
        routes: Mutex<Vec<IpNetwork>>,
    }

    #[async_trait]
    impl DaemonControl for StaticDaemon {
        async fn status(&self) -> Result<DaemonStatus, DaemonError> {
            Ok(DaemonStatus {
                backend_state: self.state.clone(),
                tailnet: None,
            })
        }

        async fn preferences(&self) -> Result<DaemonPreferences, DaemonError> {
            Ok(DaemonPreferences {
                advertise_routes: self.routes.lock().unwrap().clone(),
            })
        }

        async fn update_preferences(&self, update: &PreferencesUpdate) -> Result<(), DaemonError> {
            if let Some(routes) = &update.advertise_routes {
                *self.routes.lock().unwrap() = routes.clone();
            }
            Ok(())
        }
    }

    fn context(node: Option<NodeRecord>, state: BackendState) -> Arc<Context> {
        let reconciler = RouteReconciler::new(
            "worker-3",
            Arc::new(StaticNodes(node)),
            Arc::new(StaticDaemon {
                state,
                routes: Mutex::new(Vec::new()),
            }),
            Arc::new(NoopEventSink),
        );
        Arc::new(Context::new(
            reconciler,
            Arc::new(ControllerMetrics::new().unwrap()),
        ))
    }

    fn node_object() -> Arc<Node> {
        Arc::new(Node {
            metadata: ObjectMeta {
                name: Some("worker-3".to_string()),
                generation: Some(1),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn worker_record() -> NodeRecord {
        NodeRecord::new("worker-3", vec!["10.1.2.0/24".to_string()])
    }

    #[test]
    fn test_action_for_outcomes() {
        assert_eq!(
            action_for(&PassOutcome::Deferred {
                retry_after: Duration::from_secs(5)
            }),
            Action::requeue(Duration::from_secs(5))
        );
        assert_eq!(action_for(&PassOutcome::Unchanged), Action::await_change());
        assert_eq!(
            action_for(&PassOutcome::Advertised { added: vec![] }),
            Action::await_change()
        );
    }

    #[test]
    fn test_error_backoff_doubles_and_caps() {
        assert_eq!(error_backoff(0), Duration::from_secs(5));
        assert_eq!(error_backoff(1), Duration::from_secs(10));
        assert_eq!(error_backoff(3), Duration::from_secs(40));
        assert_eq!(error_backoff(6), Duration::from_secs(300));
        assert_eq!(error_backoff(u32::MAX), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_reconcile_advertises_and_awaits_change() {
        let ctx = context(Some(worker_record()), BackendState::Running);

        let action = reconcile(node_object(), ctx.clone()).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(ctx.metrics.routes_advertised_total.get(), 1.0);
    }

    #[tokio::test]
    async fn test_reconcile_requeues_when_daemon_starting() {
        let ctx = context(Some(worker_record()), BackendState::Starting);

        let action = reconcile(node_object(), ctx).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_failures_back_off_then_reset() {
        let ctx = context(None, BackendState::Running);

        let err = reconcile(node_object(), ctx.clone()).await.unwrap_err();
        assert_eq!(
            error_policy(node_object(), &err, ctx.clone()),
            Action::requeue(Duration::from_secs(5))
        );
        assert_eq!(
            error_policy(node_object(), &err, ctx.clone()),
            Action::requeue(Duration::from_secs(10))
        );
        assert_eq!(
            ctx.metrics.reconcile_total.with_label_values(&["error"]).get(),
            1.0
        );

        let ok_ctx = context(Some(worker_record()), BackendState::Running);
        ok_ctx.failures.store(4, Ordering::Relaxed);
        reconcile(node_object(), ok_ctx.clone()).await.unwrap();
        assert_eq!(ok_ctx.failures.load(Ordering::Relaxed), 0);
    }
}
