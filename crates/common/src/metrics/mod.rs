//! Metrics and observability utilities
//!
//! Provides Prometheus-style metrics with standardized naming conventions.
//! Recording is a no-op until a recorder (e.g. the Prometheus exporter in the
//! gateway) is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all Stormwatch metrics
pub const METRICS_PREFIX: &str = "stormwatch";

/// Buckets for end-to-end answer latency (in seconds); generation dominates
pub const ANSWER_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Query metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of questions answered (including error answers)"
    );

    describe_histogram!(
        format!("{}_answer_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end answer latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieved_chunks", METRICS_PREFIX),
        Unit::Count,
        "Number of chunks retrieved for the last query"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding provider requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding request latency in seconds"
    );

    // Build metrics
    describe_counter!(
        format!("{}_chunks_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks written to the vector index"
    );

    describe_histogram!(
        format!("{}_index_build_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Offline index build duration in seconds"
    );

    // Orchestrator metrics
    describe_counter!(
        format!("{}_initializations_total", METRICS_PREFIX),
        Unit::Count,
        "Generation pipeline initialisation attempts"
    );

    describe_counter!(
        format!("{}_generation_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Per-request retrieval or generation failures"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record an answered query
pub fn record_query(duration_secs: f64, backend: &str, retrieved: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "backend" => backend.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        format!("{}_answer_duration_seconds", METRICS_PREFIX),
        "backend" => backend.to_string()
    )
    .record(duration_secs);

    gauge!(format!("{}_retrieved_chunks", METRICS_PREFIX)).set(retrieved as f64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);

        counter!(
            format!("{}_embedded_texts_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(batch_size as u64);
    }
}

/// Helper to record an offline index build
pub fn record_build(duration_secs: f64, chunks_indexed: usize, mode: &str) {
    counter!(
        format!("{}_chunks_indexed_total", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .increment(chunks_indexed as u64);

    histogram!(format!("{}_index_build_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record an orchestrator initialisation attempt
pub fn record_initialization(stage: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_initializations_total", METRICS_PREFIX),
        "stage" => stage.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Helper to record a per-request failure
pub fn record_generation_error(kind: &str) {
    counter!(
        format!("{}_generation_errors_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in ANSWER_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: every helper must be a silent no-op
        register_metrics();
        record_query(0.2, "local", 3, true);
        record_embedding(0.01, "hashing-v1", 4, true);
        record_build(1.5, 12, "replace");
        record_initialization("chain", false);
        record_generation_error("generation");
    }
}
