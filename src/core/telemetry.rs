use tracing::Span;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use crate::core::config::Settings;
use crate::schemas::EntityId;

/// Installs the global subscriber. Logs go to stderr; stdout belongs to the console.
pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.telemetry().log_level))
        .map_err(|err| anyhow::anyhow!("invalid EXAM_LOG_LEVEL: {err}"))?;

    let builder = fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);

    let installed = if settings.telemetry().json {
        builder.json().flatten_event(true).with_current_span(true).try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|err| anyhow::anyhow!(err.to_string()))
}

/// Root span for one exam-taking session; every log line of the session carries its ids.
pub(crate) fn session_span(attempt_id: &EntityId) -> Span {
    tracing::info_span!("exam_session", session_id = %Uuid::new_v4(), attempt_id = %attempt_id)
}
