//! Node lookups against the Kubernetes API

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use tailnode_core::{ClusterError, NodeRecord, NodeSource};
use tracing::debug;

/// NodeSource backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeNodeSource {
    client: Client,
}

impl KubeNodeSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NodeSource for KubeNodeSource {
    async fn get_node(&self, name: &str) -> Result<NodeRecord, ClusterError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        match nodes.get(name).await {
            Ok(node) => {
                let record = node_record(&node);
                debug!(node = %record.name, pod_cidrs = ?record.pod_cidrs, "fetched node");
                Ok(record)
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                Err(ClusterError::NotFound(name.to_string()))
            }
            Err(e) => Err(ClusterError::Transport(Box::new(e))),
        }
    }
}

/// Extract the fields the reconciler needs from a Node.
///
/// `spec.podCIDRs` is authoritative; the legacy single `spec.podCIDR` is
/// used only when the list is absent or empty.
pub fn node_record(node: &Node) -> NodeRecord {
    let spec = node.spec.as_ref();
    let mut pod_cidrs = spec
        .and_then(|s| s.pod_cidrs.clone())
        .unwrap_or_default();
    if pod_cidrs.is_empty() {
        if let Some(cidr) = spec.and_then(|s| s.pod_cidr.clone()) {
            pod_cidrs.push(cidr);
        }
    }

    NodeRecord {
        name: node.metadata.name.clone().unwrap_or_default(),
        uid: node.metadata.uid.clone(),
        pod_cidrs,
    }
}
