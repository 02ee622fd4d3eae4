//! Watch stream of Node changes that should trigger a reconciliation

use futures::{future, Stream, TryStreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client, ResourceExt};
use kube_runtime::reflector::Store;
use kube_runtime::{reflector, watcher, WatchStreamExt};
use tailnode_core::TriggerFilter;
use tracing::debug;

/// Watch the one Node the filter is bound to.
///
/// The watch is narrowed server-side with a `metadata.name` field selector;
/// the filter then drops notifications whose generation did not change.
/// Returns the reflector store backing the stream, as needed by
/// `Controller::for_stream`.
pub fn node_triggers(
    client: Client,
    mut filter: TriggerFilter,
) -> (
    Store<Node>,
    impl Stream<Item = Result<Node, watcher::Error>> + Send + 'static,
) {
    let nodes: Api<Node> = Api::all(client);
    let config = watcher::Config::default().fields(&name_selector(filter.node_name()));

    let (reader, writer) = reflector::store();
    let triggers = reflector(writer, watcher(nodes, config).default_backoff())
        .applied_objects()
        .try_filter(move |node| future::ready(admit(&mut filter, node)));

    (reader, triggers)
}

/// Field selector matching a single object name
pub fn name_selector(name: &str) -> String {
    format!("metadata.name={}", name)
}

/// Apply the trigger filter to an observed Node
pub fn admit(filter: &mut TriggerFilter, node: &Node) -> bool {
    let admitted = filter.admit(node.metadata.name.as_deref(), node.metadata.generation);
    if admitted {
        debug!(
            node = %node.name_any(),
            generation = ?node.metadata.generation,
            "node change admitted"
        );
    }
    admitted
}
