//! Kubernetes integration for tailnode
pub mod events;
pub mod nodes;
pub mod watch;

pub use events::KubeEventRecorder;
pub use nodes::KubeNodeSource;
pub use watch::node_triggers;
