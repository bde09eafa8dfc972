use std::sync::Arc;

use crate::api::{ExamService, UnloadBeacon};
use crate::core::config::Settings;
use crate::session::storage::SessionStorage;

/// Everything one exam-taking view needs from the application shell.
#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    service: Arc<dyn ExamService>,
    beacon: Arc<dyn UnloadBeacon>,
    storage: SessionStorage,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        service: Arc<dyn ExamService>,
        beacon: Arc<dyn UnloadBeacon>,
        storage: SessionStorage,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, service, beacon, storage }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn service(&self) -> Arc<dyn ExamService> {
        self.inner.service.clone()
    }

    pub(crate) fn beacon(&self) -> Arc<dyn UnloadBeacon> {
        self.inner.beacon.clone()
    }

    pub(crate) fn storage(&self) -> &SessionStorage {
        &self.inner.storage
    }
}
