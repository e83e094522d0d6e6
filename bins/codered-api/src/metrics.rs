// Prometheus metrics for CodeRed API

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Preview runs by language and verdict
    pub static ref RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("codered_runs_total", "Total number of preview runs"),
        &["language", "verdict"]
    )
    .expect("metric can be created");

    // Judged submissions by language and verdict
    pub static ref SUBMISSIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("codered_submissions_total", "Total number of judged submissions"),
        &["language", "verdict"]
    )
    .expect("metric can be created");

    // Per-case outcomes seen by preview runs
    pub static ref CASE_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("codered_case_outcomes_total", "Test case outcomes by status"),
        &["status"]
    )
    .expect("metric can be created");

    // End-to-end evaluation latency (in milliseconds)
    pub static ref EVALUATION_TIME: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "codered_evaluation_time_ms",
            "Evaluation time in milliseconds"
        )
        .buckets(vec![100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 120000.0]),
        &["endpoint"]
    )
    .expect("metric can be created");

    // Requests refused before evaluation
    pub static ref REQUESTS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("codered_requests_rejected_total", "Requests rejected before evaluation"),
        &["reason"]
    )
    .expect("metric can be created");
}

/// Register every collector with the global registry
pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(RUNS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SUBMISSIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CASE_OUTCOMES.clone()))?;
    REGISTRY.register(Box::new(EVALUATION_TIME.clone()))?;
    REGISTRY.register(Box::new(REQUESTS_REJECTED.clone()))?;
    Ok(())
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

pub fn record_run(language: &str, verdict: &str, elapsed_ms: f64) {
    RUNS_TOTAL.with_label_values(&[language, verdict]).inc();
    EVALUATION_TIME.with_label_values(&["run"]).observe(elapsed_ms);
}

pub fn record_case_outcome(status: &str) {
    CASE_OUTCOMES.with_label_values(&[status]).inc();
}

pub fn record_submission(language: &str, verdict: &str, elapsed_ms: f64) {
    SUBMISSIONS_TOTAL.with_label_values(&[language, verdict]).inc();
    EVALUATION_TIME.with_label_values(&["submit"]).observe(elapsed_ms);
}

pub fn record_rejected(reason: &str) {
    REQUESTS_REJECTED.with_label_values(&[reason]).inc();
}
