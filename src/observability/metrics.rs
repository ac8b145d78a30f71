//! Metrics collection.
//!
//! # Metrics
//! - `config_fragments_loaded_total` (counter): fragment loads by source kind, outcome
//! - `config_compile_runs_total` (counter): compilation runs by outcome
//! - `config_compile_duration_seconds` (histogram): end-to-end run latency
//! - `config_validation_errors_total` (counter): validation errors by kind
//!
//! # Design Decisions
//! - Uses the `metrics` facade only; exporting is the host's concern
//! - Labels are low-cardinality (no key paths, no origins)

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::Once;
use std::time::Duration;

static DESCRIBE: Once = Once::new();

/// Register metric descriptions with whatever recorder is installed.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            "config_fragments_loaded_total",
            "Configuration fragments loaded, by source kind and outcome"
        );
        describe_counter!("config_compile_runs_total", "Compilation runs by outcome");
        describe_histogram!(
            "config_compile_duration_seconds",
            "Compilation run duration in seconds"
        );
        describe_counter!(
            "config_validation_errors_total",
            "Validation errors reported, by kind"
        );
    });
}

/// Records one fragment load.
pub fn record_fragment_load(kind: &str, ok: bool) {
    counter!(
        "config_fragments_loaded_total",
        "kind" => kind.to_string(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}

/// Records a finished compilation run.
///
/// `outcome` is `"ok"` or the failing stage (e.g. `"validation"`).
pub fn record_compile(outcome: &str, duration: Duration) {
    counter!("config_compile_runs_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("config_compile_duration_seconds").record(duration.as_secs_f64());
}

/// Records a validation error.
pub fn record_validation_error(kind: &str) {
    counter!("config_validation_errors_total", "kind" => kind.to_string()).increment(1);
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}
