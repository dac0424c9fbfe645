//! Runtime counters for the VDB registry.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::histogram::Histogram;

/// Counters and latency for registry activity.
///
/// One instance is owned by a [`crate::Registry`] and shared with its
/// listeners and table stores.
#[derive(Debug)]
pub struct RuntimeMetrics {
    started_at: Instant,

    deployments: AtomicU64,
    undeployments: AtomicU64,
    composition_failures: AtomicU64,
    activations: AtomicU64,
    inactivations: AtomicU64,
    load_failures: AtomicU64,
    repairs: AtomicU64,
    listener_failures: AtomicU64,
    load_claims: AtomicU64,

    finalize_latency: Histogram,
}

/// Shared metrics handle.
pub type SharedRuntimeMetrics = Arc<RuntimeMetrics>;

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            deployments: AtomicU64::new(0),
            undeployments: AtomicU64::new(0),
            composition_failures: AtomicU64::new(0),
            activations: AtomicU64::new(0),
            inactivations: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
            repairs: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
            load_claims: AtomicU64::new(0),
            finalize_latency: Histogram::finalize_latency(),
        }
    }

    pub fn record_deployment(&self) {
        self.deployments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_undeployment(&self) {
        self.undeployments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_composition_failure(&self) {
        self.composition_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inactivation(&self) {
        self.inactivations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_repair(&self) {
        self.repairs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listener_failure(&self) {
        self.listener_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A node took ownership of loading a materialized table.
    pub fn record_load_claim(&self) {
        self.load_claims.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finalize(&self, elapsed: Duration) {
        self.finalize_latency.observe_duration(elapsed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn deployments(&self) -> u64 {
        self.deployments.load(Ordering::Relaxed)
    }

    pub fn undeployments(&self) -> u64 {
        self.undeployments.load(Ordering::Relaxed)
    }

    pub fn composition_failures(&self) -> u64 {
        self.composition_failures.load(Ordering::Relaxed)
    }

    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    pub fn inactivations(&self) -> u64 {
        self.inactivations.load(Ordering::Relaxed)
    }

    pub fn load_failures(&self) -> u64 {
        self.load_failures.load(Ordering::Relaxed)
    }

    pub fn repairs(&self) -> u64 {
        self.repairs.load(Ordering::Relaxed)
    }

    pub fn listener_failures(&self) -> u64 {
        self.listener_failures.load(Ordering::Relaxed)
    }

    pub fn load_claims(&self) -> u64 {
        self.load_claims.load(Ordering::Relaxed)
    }

    /// Metadata finalization latency histogram.
    pub fn finalize_latency(&self) -> &Histogram {
        &self.finalize_latency
    }

    /// Export in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        gauge(&mut out, "vdbhub_uptime_seconds", "Runtime uptime in seconds", self.uptime_secs());

        let counters = [
            ("vdbhub_deployments_total", "VDBs published to the registry", self.deployments()),
            ("vdbhub_undeployments_total", "VDBs removed from the registry", self.undeployments()),
            (
                "vdbhub_composition_failures_total",
                "VDBs rejected during import composition",
                self.composition_failures(),
            ),
            ("vdbhub_activations_total", "Transitions to ACTIVE", self.activations()),
            ("vdbhub_inactivations_total", "Transitions to INACTIVE", self.inactivations()),
            ("vdbhub_load_failures_total", "Metadata load failures reported", self.load_failures()),
            ("vdbhub_repairs_total", "Composite VDBs repaired after an import was removed", self.repairs()),
            ("vdbhub_listener_failures_total", "Lifecycle listener callbacks that failed", self.listener_failures()),
            ("vdbhub_mat_load_claims_total", "Materialized table loads claimed by this node", self.load_claims()),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}\n");
        }

        let name = "vdbhub_metadata_finalize_us";
        let _ = writeln!(out, "# HELP {name} Metadata finalization latency in microseconds");
        let _ = writeln!(out, "# TYPE {name} histogram");
        for (bound, count) in self.finalize_latency.cumulative() {
            if bound == u64::MAX {
                let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {count}");
            } else {
                let _ = writeln!(out, "{name}_bucket{{le=\"{bound}\"}} {count}");
            }
        }
        let _ = writeln!(out, "{name}_sum {}", self.finalize_latency.sum());
        let _ = writeln!(out, "{name}_count {}", self.finalize_latency.count());

        out
    }
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn gauge(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = RuntimeMetrics::new();
        metrics.record_deployment();
        metrics.record_deployment();
        metrics.record_undeployment();
        metrics.record_repair();
        metrics.record_listener_failure();

        assert_eq!(metrics.deployments(), 2);
        assert_eq!(metrics.undeployments(), 1);
        assert_eq!(metrics.repairs(), 1);
        assert_eq!(metrics.listener_failures(), 1);
        assert_eq!(metrics.activations(), 0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = RuntimeMetrics::new();
        metrics.record_activation();
        metrics.record_finalize(Duration::from_micros(800));

        let text = metrics.to_prometheus();
        assert!(text.contains("# TYPE vdbhub_activations_total counter"));
        assert!(text.contains("vdbhub_activations_total 1"));
        assert!(text.contains("vdbhub_metadata_finalize_us_bucket{le=\"1000\"} 1"));
        assert!(text.contains("vdbhub_metadata_finalize_us_bucket{le=\"+Inf\"} 1"));
        assert!(text.contains("vdbhub_metadata_finalize_us_count 1"));
    }
}
