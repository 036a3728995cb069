//! Prometheus metrics setup and metric definitions

use anyhow::Context;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines for all metrics from startup (not just after first use).
pub fn describe_metrics() {
    describe_counter!(
        "toolhub_authz_decisions_total",
        "Authorization decisions by query (role, permission, module) and outcome"
    );
    describe_counter!(
        "toolhub_permission_denied_total",
        "Requests refused by a mutation guard or the edge gate"
    );
    describe_counter!(
        "toolhub_store_timeouts_total",
        "Store calls that exceeded the authorization deadline"
    );
    describe_counter!(
        "toolhub_audit_write_failures_total",
        "Audit entries that could not be written"
    );

    for query in ["role", "permission", "module"] {
        for outcome in ["allow", "deny"] {
            counter!("toolhub_authz_decisions_total", "query" => query, "outcome" => outcome)
                .absolute(0);
        }
    }
}
