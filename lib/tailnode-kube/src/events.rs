//! Kubernetes Events for advertised routes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::PostParams;
use kube::{Api, Client};
use tailnode_core::{display_ranges, EventSink, RoutesAdvertised};
use tracing::{debug, warn};

/// Component name attached to every event
pub const REPORTING_COMPONENT: &str = "tailscalenode";

/// Events about cluster-scoped objects live in the default namespace
const EVENT_NAMESPACE: &str = "default";

/// EventSink that records a core/v1 Event on the Node
#[derive(Clone)]
pub struct KubeEventRecorder {
    client: Client,
    reporting_instance: Option<String>,
}

impl KubeEventRecorder {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            reporting_instance: None,
        }
    }

    /// Identify this process (usually the pod name) in emitted events
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.reporting_instance = Some(instance.into());
        self
    }
}

#[async_trait]
impl EventSink for KubeEventRecorder {
    async fn routes_advertised(&self, event: &RoutesAdvertised) {
        let events: Api<Event> = Api::namespaced(self.client.clone(), EVENT_NAMESPACE);
        let record = build_event(event, self.reporting_instance.as_deref(), Utc::now());

        match events.create(&PostParams::default(), &record).await {
            Ok(_) => debug!(node = %event.node, reason = RoutesAdvertised::REASON, "recorded event"),
            Err(e) => warn!(node = %event.node, error = %e, "failed to record event"),
        }
    }
}

/// Build the Event recorded after routes were advertised for a node
pub fn build_event(
    event: &RoutesAdvertised,
    reporting_instance: Option<&str>,
    now: DateTime<Utc>,
) -> Event {
    Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}.", event.node)),
            namespace: Some(EVENT_NAMESPACE.to_string()),
            ..Default::default()
        },
        involved_object: ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some("Node".to_string()),
            name: Some(event.node.clone()),
            uid: event.node_uid.clone(),
            ..Default::default()
        },
        reason: Some(RoutesAdvertised::REASON.to_string()),
        message: Some(format!(
            "PodCIDR(s) {} advertised from local Tailscale daemon",
            display_ranges(&event.added)
        )),
        type_: Some("Normal".to_string()),
        source: Some(EventSource {
            component: Some(REPORTING_COMPONENT.to_string()),
            host: Some(event.node.clone()),
        }),
        first_timestamp: Some(Time(now)),
        last_timestamp: Some(Time(now)),
        count: Some(1),
        reporting_component: Some(REPORTING_COMPONENT.to_string()),
        reporting_instance: reporting_instance.map(str::to_string),
        ..Default::default()
    }
}
