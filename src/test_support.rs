use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::api::{ClientError, ExamService, UnloadBeacon};
use crate::core::config::Settings;
use crate::core::state::AppState;
use crate::schemas::exam::AttemptResponse;
use crate::schemas::issue::{ReportIssueRequest, ReportIssueResponse};
use crate::schemas::progress::{ProgressAnswer, RestoreProgressResponse};
use crate::schemas::submission::{ExamResultResponse, SubmitExamRequest};
use crate::schemas::EntityId;
use crate::session::model::ExamAttempt;
use crate::session::storage::SessionStorage;
use crate::session::WindowEvents;

pub(crate) const SAMPLE_ATTEMPT_ID: i64 = 42;
pub(crate) const SAMPLE_EXAM_ID: i64 = 7;
const TEST_BASE_URL: &str = "http://127.0.0.1:5000";
const TEST_AUTH_TOKEN: &str = "test-token";

const SESSION_ENV: [&str; 7] = [
    "EXAM_VIOLATION_THRESHOLD",
    "EXAM_VIOLATION_SUBMIT_DELAY_MS",
    "EXAM_BLUR_DEBOUNCE_MS",
    "EXAM_FILE_PICKER_GRACE_MS",
    "EXAM_DEVTOOLS_CHECK_INTERVAL_MS",
    "EXAM_DEVTOOLS_THRESHOLD_PX",
    "EXAM_FALLBACK_DURATION_MINUTES",
];

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<AsyncMutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(AsyncMutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAM_ENV", "test");
    std::env::set_var("EXAM_STRICT_CONFIG", "0");
    std::env::set_var("EXAM_API_BASE_URL", TEST_BASE_URL);
    std::env::remove_var("VITE_API_BASE_URL");
    std::env::set_var("EXAM_AUTH_TOKEN", TEST_AUTH_TOKEN);
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    for key in SESSION_ENV {
        std::env::remove_var(key);
    }
}

/// Five questions: 0, 1 and 3 single-choice with three options, 2 multiple-select with
/// four, 4 multiple-select with three. Option `j` of question `i` has id `(i + 1) * 1000 + j`.
pub(crate) fn sample_attempt_response() -> AttemptResponse {
    let questions: Vec<_> = (0..5)
        .map(|index: i64| {
            let multiple = index == 2 || index == 4;
            let option_count = if index == 2 { 4 } else { 3 };
            let options: Vec<_> = (0..option_count)
                .map(|option| {
                    json!({
                        "id": (index + 1) * 1000 + option,
                        "text": format!("Option {option}"),
                    })
                })
                .collect();
            json!({
                "id": 100 + index,
                "text": format!("Question {}", index + 1),
                "questionType": if multiple { "MultipleChoice" } else { "SingleChoice" },
                "options": options,
            })
        })
        .collect();

    serde_json::from_value(json!({
        "id": SAMPLE_ATTEMPT_ID,
        "examId": SAMPLE_EXAM_ID,
        "examTitle": "Networking Fundamentals",
        "durationMinutes": 30,
        "questions": questions,
    }))
    .expect("sample attempt")
}

pub(crate) fn sample_attempt() -> ExamAttempt {
    ExamAttempt::from_response(EntityId::Number(SAMPLE_ATTEMPT_ID), sample_attempt_response())
        .expect("sample attempt")
}

pub(crate) fn sample_result() -> ExamResultResponse {
    serde_json::from_value(json!({
        "score": 4,
        "maxScore": 5,
        "percentage": 80.0,
        "isPassed": true,
    }))
    .expect("sample result")
}

#[derive(Debug, Clone)]
pub(crate) enum RestoreBehavior {
    Nothing,
    Saved(RestoreProgressResponse),
    Fail,
}

struct FakeState {
    attempt: Option<AttemptResponse>,
    restore: RestoreBehavior,
    submit_delay: Duration,
    submit_failures: usize,
    saves: Vec<(EntityId, EntityId, Vec<ProgressAnswer>)>,
    submissions: Vec<(EntityId, SubmitExamRequest)>,
    reports: Vec<ReportIssueRequest>,
}

/// In-memory backend that records every call.
pub(crate) struct FakeExamService {
    state: Mutex<FakeState>,
}

impl FakeExamService {
    pub(crate) fn new(attempt: AttemptResponse) -> Self {
        Self::with_attempt(Some(attempt))
    }

    /// `get_attempt` answers 404.
    pub(crate) fn missing() -> Self {
        Self::with_attempt(None)
    }

    fn with_attempt(attempt: Option<AttemptResponse>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                attempt,
                restore: RestoreBehavior::Nothing,
                submit_delay: Duration::ZERO,
                submit_failures: 0,
                saves: Vec::new(),
                submissions: Vec::new(),
                reports: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_restore(&self, behavior: RestoreBehavior) {
        self.lock().restore = behavior;
    }

    pub(crate) fn set_submit_delay(&self, delay: Duration) {
        self.lock().submit_delay = delay;
    }

    /// The next `count` submissions answer 500.
    pub(crate) fn fail_next_submissions(&self, count: usize) {
        self.lock().submit_failures = count;
    }

    pub(crate) fn saves(&self) -> Vec<(EntityId, EntityId, Vec<ProgressAnswer>)> {
        self.lock().saves.clone()
    }

    pub(crate) fn submissions(&self) -> Vec<(EntityId, SubmitExamRequest)> {
        self.lock().submissions.clone()
    }

    pub(crate) fn reports(&self) -> Vec<ReportIssueRequest> {
        self.lock().reports.clone()
    }
}

#[async_trait]
impl ExamService for FakeExamService {
    async fn get_attempt(&self, _attempt_id: &EntityId) -> Result<AttemptResponse, ClientError> {
        self.lock()
            .attempt
            .clone()
            .ok_or_else(|| ClientError::from_status(404, r#"{"detail":"Attempt not found"}"#))
    }

    async fn save_progress(
        &self,
        exam_id: &EntityId,
        attempt_id: &EntityId,
        answers: Vec<ProgressAnswer>,
    ) -> Result<(), ClientError> {
        self.lock().saves.push((exam_id.clone(), attempt_id.clone(), answers));
        Ok(())
    }

    async fn restore_progress(
        &self,
        _exam_id: &EntityId,
        _attempt_id: &EntityId,
    ) -> Result<Option<RestoreProgressResponse>, ClientError> {
        let behavior = self.lock().restore.clone();
        match behavior {
            RestoreBehavior::Nothing => Ok(None),
            RestoreBehavior::Saved(saved) => Ok(Some(saved)),
            RestoreBehavior::Fail => Err(ClientError::from_status(503, "")),
        }
    }

    async fn submit_exam(
        &self,
        exam_id: &EntityId,
        request: SubmitExamRequest,
    ) -> Result<ExamResultResponse, ClientError> {
        let delay = self.lock().submit_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.submissions.push((exam_id.clone(), request));
        if state.submit_failures > 0 {
            state.submit_failures -= 1;
            return Err(ClientError::from_status(500, r#"{"detail":"Grading unavailable"}"#));
        }
        Ok(sample_result())
    }

    async fn report_issue(
        &self,
        request: ReportIssueRequest,
    ) -> Result<ReportIssueResponse, ClientError> {
        self.lock().reports.push(request);
        Ok(ReportIssueResponse { message: "Issue reported".to_string() })
    }
}

#[derive(Default)]
pub(crate) struct RecordingBeacon {
    dispatched: Mutex<Vec<(EntityId, SubmitExamRequest)>>,
}

impl RecordingBeacon {
    pub(crate) fn dispatched(&self) -> Vec<(EntityId, SubmitExamRequest)> {
        self.dispatched.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl UnloadBeacon for RecordingBeacon {
    fn dispatch(&self, exam_id: &EntityId, request: &SubmitExamRequest) {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((exam_id.clone(), request.clone()));
    }
}

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) window: WindowEvents,
    pub(crate) service: Arc<FakeExamService>,
    pub(crate) beacon: Arc<RecordingBeacon>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn setup_test_context() -> TestContext {
    setup_test_context_with(FakeExamService::new(sample_attempt_response()), &[]).await
}

/// `overrides` are applied to the environment before settings load.
pub(crate) async fn setup_test_context_with(
    service: FakeExamService,
    overrides: &[(&str, &str)],
) -> TestContext {
    let guard = env_lock().await;
    set_test_env();
    for (key, value) in overrides {
        std::env::set_var(key, value);
    }
    let settings = Settings::load().expect("settings");
    for (key, _) in overrides {
        std::env::remove_var(key);
    }

    let service = Arc::new(service);
    let beacon = Arc::new(RecordingBeacon::default());
    let state = AppState::new(settings, service.clone(), beacon.clone(), SessionStorage::new());

    TestContext { state, window: WindowEvents::new(), service, beacon, _guard: guard }
}

impl TestContext {
    pub(crate) fn attempt_id(&self) -> EntityId {
        EntityId::Number(SAMPLE_ATTEMPT_ID)
    }
}
