//! # Metrics Collection
//!
//! Snapshot and mutation metrics recorded through the `metrics` facade. No
//! exporter is installed here; without a global recorder the calls are no-ops.

use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};

/// Metrics recorder that tracks configuration activity
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record a snapshot build attempt (`success`, `inconsistent`, `rejected`, `encoding_error`)
    pub fn record_snapshot_build(&self, status: &str) {
        let labels = [("status", status.to_string())];
        counter!("snapshot_builds_total", &labels).increment(1);
    }

    /// Update the last published snapshot version
    pub fn update_snapshot_version(&self, version: u64) {
        gauge!("snapshot_version").set(version as f64);
    }

    /// Update the resource count of one kind in the last published snapshot
    pub fn update_snapshot_resources(&self, resource_type: &str, count: usize) {
        let labels = [("type", resource_type.to_string())];
        gauge!("snapshot_resources", &labels).set(count as f64);
    }

    /// Record a store mutation and whether it was accepted
    pub fn record_mutation(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        let labels = [("operation", operation.to_string()), ("status", status.to_string())];
        counter!("mutations_total", &labels).increment(1);
    }

    /// Register descriptions for snapshot metrics
    pub fn register_snapshot_metrics(&self) {
        describe_counter!(
            "snapshot_builds_total",
            Unit::Count,
            "Snapshot build attempts by outcome"
        );
        describe_gauge!("snapshot_version", Unit::Count, "Version of the last published snapshot");
        describe_gauge!(
            "snapshot_resources",
            Unit::Count,
            "Resources per kind in the last published snapshot"
        );
        describe_counter!(
            "mutations_total",
            Unit::Count,
            "Configuration mutations by operation and outcome"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recorder_without_global_recorder() {
        let recorder = MetricsRecorder::new();
        recorder.register_snapshot_metrics();
        recorder.record_snapshot_build("success");
        recorder.update_snapshot_version(3);
        recorder.update_snapshot_resources("clusters", 2);
        recorder.record_mutation("add_endpoint", true);
        recorder.record_mutation("add_cluster", false);
    }
}
