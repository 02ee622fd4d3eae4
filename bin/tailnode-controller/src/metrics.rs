//! Prometheus metrics for reconciliation passes

use anyhow::Result;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use tailnode_core::{PassOutcome, ReconcileError};

/// Prometheus metrics collector for the controller
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Passes by outcome (deferred, unchanged, advertised, error)
    pub reconcile_total: CounterVec,
    /// Pass duration in seconds
    pub reconcile_duration_seconds: Histogram,
    /// Address ranges newly advertised
    pub routes_advertised_total: Counter,
    pub registry: Arc<Registry>,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let reconcile_total = CounterVec::new(
            Opts::new("tailnode_reconcile_total", "Reconciliation passes by outcome"),
            &["outcome"],
        )?;

        let reconcile_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "tailnode_reconcile_duration_seconds",
            "Reconciliation pass duration in seconds",
        ))?;

        let routes_advertised_total = Counter::new(
            "tailnode_routes_advertised_total",
            "Address ranges newly advertised from the daemon",
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;
        registry.register(Box::new(routes_advertised_total.clone()))?;

        Ok(Self {
            reconcile_total,
            reconcile_duration_seconds,
            routes_advertised_total,
            registry,
        })
    }

    /// Record the result of one pass
    pub fn observe(&self, result: &Result<PassOutcome, ReconcileError>, elapsed: Duration) {
        self.reconcile_duration_seconds.observe(elapsed.as_secs_f64());

        let label = match result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        self.reconcile_total.with_label_values(&[label]).inc();

        if let Ok(PassOutcome::Advertised { added }) = result {
            self.routes_advertised_total.inc_by(added.len() as f64);
        }
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
