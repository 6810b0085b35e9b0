//! Prometheus metrics for flock-server.
//!
//! Exposed in Prometheus format at the `/metrics` endpoint of the health
//! server.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder and return a handle for rendering.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    describe_counter!(
        "flock_grpc_requests_total",
        "Total number of authenticated gRPC requests processed"
    );
    describe_counter!("flock_votes_cast_total", "Total number of votes cast");
    describe_counter!(
        "flock_consensus_total",
        "Total number of resolved vote sessions by outcome"
    );

    handle
}

/// Record an authenticated gRPC request.
pub fn record_grpc_request(method: &str) {
    counter!("flock_grpc_requests_total", "method" => method.to_string()).increment(1);
}

/// Record a cast vote.
pub fn record_vote_cast() {
    counter!("flock_votes_cast_total").increment(1);
}

/// Record a resolved vote session.
pub fn record_consensus(outcome: &'static str) {
    counter!("flock_consensus_total", "outcome" => outcome).increment(1);
}
