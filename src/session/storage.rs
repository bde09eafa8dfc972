use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::schemas::submission::{ExamResultResponse, SubmissionAnswer};
use crate::schemas::EntityId;

/// What the results view needs to render without refetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredResult {
    pub(crate) exam_title: String,
    pub(crate) result: ExamResultResponse,
    pub(crate) submitted_answers: Vec<SubmissionAnswer>,
    #[serde(default)]
    pub(crate) violation_reason: Option<String>,
    pub(crate) stored_at: String,
}

fn result_key(attempt_id: &EntityId) -> String {
    format!("examResult_{attempt_id}")
}

fn auto_submitted_key(attempt_id: &EntityId) -> String {
    format!("autoSubmitted_{attempt_id}")
}

/// Tab-scoped string store shared by the exam and results views.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl SessionStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_item(&self, key: &str, value: String) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_string(), value);
    }

    pub(crate) fn get_item(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    pub(crate) fn remove_item(&self, key: &str) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
    }

    pub(crate) fn store_result(
        &self,
        attempt_id: &EntityId,
        stored: &StoredResult,
    ) -> Result<(), serde_json::Error> {
        let raw = serde_json::to_string(stored)?;
        self.set_item(&result_key(attempt_id), raw);
        Ok(())
    }

    /// `None` when nothing is stored or the stored value no longer parses.
    pub(crate) fn load_result(&self, attempt_id: &EntityId) -> Option<StoredResult> {
        let raw = self.get_item(&result_key(attempt_id))?;
        match serde_json::from_str(&raw) {
            Ok(stored) => Some(stored),
            Err(err) => {
                tracing::warn!(attempt_id = %attempt_id, error = %err, "Discarding unreadable stored result");
                self.remove_item(&result_key(attempt_id));
                None
            }
        }
    }

    pub(crate) fn mark_auto_submitted(&self, attempt_id: &EntityId) {
        self.set_item(&auto_submitted_key(attempt_id), "true".to_string());
    }

    pub(crate) fn was_auto_submitted(&self, attempt_id: &EntityId) -> bool {
        self.get_item(&auto_submitted_key(attempt_id)).is_some_and(|value| value == "true")
    }
}
