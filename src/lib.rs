pub(crate) mod api;
pub(crate) mod console;
pub(crate) mod core;
pub(crate) mod schemas;
pub(crate) mod session;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::Instrument;

use crate::api::{HttpExamService, KeepaliveBeacon};
use crate::core::{config::Settings, state::AppState, telemetry};
use crate::schemas::EntityId;
use crate::session::storage::SessionStorage;
use crate::session::WindowEvents;

const BEACON_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let attempt_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("EXAM_ATTEMPT_ID").ok())
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| EntityId::parse(&raw))
        .context("usage: exam-session <attempt-id> (or set EXAM_ATTEMPT_ID)")?;

    let service = HttpExamService::from_settings(&settings)?;
    let beacon = Arc::new(KeepaliveBeacon::from_settings(&settings)?);

    tracing::info!(
        base_url = %settings.api().base_url,
        environment = %settings.runtime().environment.as_str(),
        "Exam session client starting"
    );

    let state = AppState::new(settings, Arc::new(service), beacon.clone(), SessionStorage::new());
    let span = telemetry::session_span(&attempt_id);
    let result = console::run(state, WindowEvents::new(), attempt_id).instrument(span).await;

    beacon.drain(BEACON_DRAIN_TIMEOUT).await;
    if let Some(rendered) = core::metrics::render() {
        eprintln!("{rendered}");
    }

    result?;
    Ok(())
}
