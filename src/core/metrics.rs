use std::sync::OnceLock;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

const VIOLATIONS_TOTAL: &str = "exam_violations_total";
const SUBMISSIONS_TOTAL: &str = "exam_submissions_total";

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder when enabled; otherwise counters are no-ops.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    describe_counter!(VIOLATIONS_TOTAL, "Integrity violations counted, by signal");
    describe_counter!(SUBMISSIONS_TOTAL, "Exam submissions, by trigger and outcome");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far.
pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(PrometheusHandle::render)
}

pub(crate) fn record_violation(signal: &'static str) {
    counter!(VIOLATIONS_TOTAL, "signal" => signal).increment(1);
}

pub(crate) fn record_submission(trigger: &'static str, outcome: &'static str) {
    counter!(SUBMISSIONS_TOTAL, "trigger" => trigger, "outcome" => outcome).increment(1);
}
