//! Decides which Node change notifications start a reconciliation pass

use tracing::trace;

/// Admits notifications for one bound node whose generation changed.
///
/// The first notification for the node is always admitted. After that a
/// notification is admitted only when its generation differs from the last
/// admitted one, so status-only churn does not start a pass. Notifications
/// without a name are dropped.
#[derive(Clone, Debug)]
pub struct TriggerFilter {
    node_name: String,
    last_generation: Option<Option<i64>>,
}

impl TriggerFilter {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            last_generation: None,
        }
    }

    /// Name of the node this filter is bound to
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Returns true if the notification should start a pass
    pub fn admit(&mut self, name: Option<&str>, generation: Option<i64>) -> bool {
        let Some(name) = name else {
            trace!("dropping node notification without a name");
            return false;
        };
        if name != self.node_name {
            trace!(node = %name, bound = %self.node_name, "ignoring notification for other node");
            return false;
        }

        match self.last_generation {
            Some(last) if last == generation => {
                trace!(node = %name, ?generation, "generation unchanged");
                false
            }
            _ => {
                self.last_generation = Some(generation);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_node_never_admitted() {
        let mut filter = TriggerFilter::new("worker-3");
        assert!(!filter.admit(Some("other"), Some(1)));
        assert!(!filter.admit(Some("other"), Some(2)));
        assert!(!filter.admit(Some("worker-30"), Some(1)));
    }

    #[test]
    fn test_first_sighting_admitted() {
        let mut filter = TriggerFilter::new("worker-3");
        assert!(filter.admit(Some("worker-3"), Some(4)));
    }

    #[test]
    fn test_same_generation_dropped() {
        let mut filter = TriggerFilter::new("worker-3");
        assert!(filter.admit(Some("worker-3"), Some(4)));
        assert!(!filter.admit(Some("worker-3"), Some(4)));
        assert!(!filter.admit(Some("worker-3"), Some(4)));
    }

    #[test]
    fn test_generation_change_admitted() {
        let mut filter = TriggerFilter::new("worker-3");
        assert!(filter.admit(Some("worker-3"), Some(4)));
        assert!(filter.admit(Some("worker-3"), Some(5)));
        assert!(!filter.admit(Some("worker-3"), Some(5)));
    }

    #[test]
    fn test_missing_generation_treated_as_value() {
        let mut filter = TriggerFilter::new("worker-3");
        assert!(filter.admit(Some("worker-3"), None));
        assert!(!filter.admit(Some("worker-3"), None));
        assert!(filter.admit(Some("worker-3"), Some(1)));
    }

    #[test]
    fn test_other_node_does_not_disturb_state() {
        let mut filter = TriggerFilter::new("worker-3");
        assert!(filter.admit(Some("worker-3"), Some(2)));
        assert!(!filter.admit(Some("other"), Some(3)));
        assert!(!filter.admit(Some("worker-3"), Some(2)));
    }

    #[test]
    fn test_nameless_notification_dropped() {
        let mut filter = TriggerFilter::new("worker-3");
        assert!(!filter.admit(None, Some(1)));
        assert!(filter.admit(Some("worker-3"), Some(1)));
    }
}
