use std::path::PathBuf;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, Duration, Instant, MissedTickBehavior};
use validator::Validate;

use super::events::{Subscription, Visibility, WindowEvent, WindowEvents, ALL_EVENT_KINDS};
use super::integrity::{self, Verdict};
use super::model::{ExamAttempt, SessionError};
use super::progress::{reconcile_with_saved, saved_answers};
use super::state::{ExamSession, SessionView};
use super::storage::StoredResult;
use super::submission::{build_submission, SubmissionPhase, SubmitTrigger};
use super::timer::TickOutcome;
use crate::api::ClientError;
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::format_offset;
use crate::schemas::issue::{ReportIssueRequest, ReportIssueResponse};
use crate::schemas::submission::{ExamResultResponse, SubmitExamRequest};
use crate::schemas::EntityId;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Actions the candidate takes on the exam page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CandidateCommand {
    SelectAnswer { question: usize, option: usize },
    ToggleFlag(usize),
    GoTo(usize),
    Next,
    Previous,
    SaveProgress,
    Submit,
    OpenReport,
    CloseReport,
    FilePickerOpened,
    ReportIssue { description: String, attachments: Vec<PathBuf> },
    Leave,
}

/// Dismissible messages for the candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionNotice {
    ViolationRecorded { reason: String, count: u32, threshold: u32 },
    /// The exam is about to be submitted because of a violation.
    ViolationWarning { reason: String },
    NothingToSave,
    ProgressSaved { answered: usize },
    IssueReported { message: String },
    Error(String),
    InvalidAction(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionOutcome {
    /// `result` is `None` when the submission left as an unload beacon.
    Submitted { trigger: SubmitTrigger, result: Option<ExamResultResponse> },
    Failed { trigger: SubmitTrigger, error: String },
    RedirectToResults(Option<StoredResult>),
    Left,
}

/// The candidate side of a running session.
pub(crate) struct SessionHandle {
    commands: mpsc::UnboundedSender<CandidateCommand>,
    notices: mpsc::UnboundedReceiver<SessionNotice>,
    view: watch::Receiver<SessionView>,
    attempt: Arc<ExamAttempt>,
}

impl SessionHandle {
    pub(crate) fn attempt(&self) -> &ExamAttempt {
        &self.attempt
    }

    /// `false` once the session has ended.
    pub(crate) fn send(&self, command: CandidateCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub(crate) async fn next_notice(&mut self) -> Option<SessionNotice> {
        self.notices.recv().await
    }

    pub(crate) fn try_notice(&mut self) -> Option<SessionNotice> {
        self.notices.try_recv().ok()
    }

    pub(crate) fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }
}

pub(crate) enum Entry {
    Exam(Box<SessionController>, SessionHandle),
    /// The attempt was already submitted automatically in this tab.
    Results(Option<StoredResult>),
}

enum Completion {
    Submitted {
        trigger: SubmitTrigger,
        request: SubmitExamRequest,
        result: Result<ExamResultResponse, ClientError>,
    },
    ViolationDelayElapsed {
        reason: String,
    },
    ProgressSaved {
        answered: usize,
        result: Result<(), ClientError>,
    },
    IssueReported(Result<ReportIssueResponse, ClientError>),
}

struct Inbox {
    events: mpsc::UnboundedReceiver<WindowEvent>,
    commands: mpsc::UnboundedReceiver<CandidateCommand>,
    completions: mpsc::UnboundedReceiver<Completion>,
}

struct Core {
    app: AppState,
    session: ExamSession,
    notices: mpsc::UnboundedSender<SessionNotice>,
    view: watch::Sender<SessionView>,
    completions: mpsc::UnboundedSender<Completion>,
    /// Reason of the violation that crossed the threshold and still owes a submission.
    owed_violation: Option<String>,
    outcome: Option<SessionOutcome>,
}

/// Drives one exam attempt from load to submission.
pub(crate) struct SessionController {
    core: Core,
    inbox: Inbox,
    subscription: Subscription,
}

impl SessionController {
    /// Loads the attempt and registers the page listeners.
    pub(crate) async fn enter(
        app: AppState,
        window: &WindowEvents,
        attempt_id: EntityId,
    ) -> Result<Entry, SessionError> {
        if app.storage().was_auto_submitted(&attempt_id) {
            tracing::info!(attempt_id = %attempt_id, "Attempt already auto-submitted; showing results");
            return Ok(Entry::Results(app.storage().load_result(&attempt_id)));
        }

        let response = app.service().get_attempt(&attempt_id).await.map_err(|source| {
            SessionError::AttemptUnavailable { attempt_id: attempt_id.clone(), source }
        })?;
        let attempt = ExamAttempt::from_response(attempt_id, response)?;
        tracing::info!(
            attempt_id = %attempt.attempt_id,
            exam_id = %attempt.exam_id,
            questions = attempt.len(),
            "Exam attempt loaded"
        );

        let session = ExamSession::new(attempt, app.settings().session(), OffsetDateTime::now_utc());
        let (subscription, events) = window.subscribe(&ALL_EVENT_KINDS, integrity::prevents_default);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(session.view());
        let attempt = session.attempt().clone();

        let controller = SessionController {
            core: Core {
                app,
                session,
                notices: notice_tx,
                view: view_tx,
                completions: completion_tx,
                owed_violation: None,
                outcome: None,
            },
            inbox: Inbox { events, commands: command_rx, completions: completion_rx },
            subscription,
        };
        let handle =
            SessionHandle { commands: command_tx, notices: notice_rx, view: view_rx, attempt };

        Ok(Entry::Exam(Box::new(controller), handle))
    }

    /// Runs the event loop until the session reaches an outcome.
    pub(crate) async fn run(self) -> SessionOutcome {
        let SessionController { mut core, mut inbox, subscription } = self;

        let probe_period = core.app.settings().session().devtools_check_interval();
        let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        let mut probe = interval_at(Instant::now() + probe_period, probe_period);
        probe.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                _ = ticker.tick() => core.on_tick(),
                _ = probe.tick() => core.on_probe(),
                Some(event) = inbox.events.recv() => core.on_window_event(event),
                command = inbox.commands.recv() => match command {
                    Some(command) => core.on_command(command),
                    None => {
                        while let Ok(event) = inbox.events.try_recv() {
                            core.on_window_event(event);
                        }
                        core.finish(SessionOutcome::Left);
                    }
                },
                Some(completion) = inbox.completions.recv() => core.on_completion(completion),
            }

            core.publish();
            if let Some(outcome) = core.outcome.take() {
                break outcome;
            }
        };

        drop(subscription);
        tracing::info!(
            attempt_id = %core.session.attempt().attempt_id,
            phase = core.session.phase().as_str(),
            "Exam session closed"
        );
        outcome
    }
}

impl Core {
    fn notify(&self, notice: SessionNotice) {
        if self.notices.send(notice).is_err() {
            tracing::debug!("Candidate handle dropped; notice discarded");
        }
    }

    fn publish(&self) {
        let next = self.session.view();
        self.view.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn finish(&mut self, outcome: SessionOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    fn is_locked(&self) -> bool {
        self.session.phase() != SubmissionPhase::Idle
    }

    fn on_tick(&mut self) {
        if self.session.tick() == TickOutcome::Expired {
            tracing::info!(attempt_id = %self.session.attempt().attempt_id, "Exam time is up");
            self.begin_submission(SubmitTrigger::TimerExpired);
        }
    }

    fn on_probe(&mut self) {
        let verdict = self.session.integrity().probe_devtools();
        self.on_verdict(verdict);
    }

    fn on_window_event(&mut self, event: WindowEvent) {
        let verdict = match event {
            WindowEvent::Blur => self.session.integrity().on_blur(Instant::now()),
            WindowEvent::KeyDown(chord) => self.session.integrity().on_key(&chord),
            WindowEvent::ContextMenu => self.session.integrity().on_context_menu(),
            WindowEvent::Clipboard { action, target } => {
                self.session.integrity().on_clipboard(action, target)
            }
            WindowEvent::Resize(metrics) => {
                self.session.integrity().observe_metrics(metrics);
                Verdict::Ignored
            }
            WindowEvent::VisibilityChange(Visibility::Hidden) => {
                self.begin_submission(SubmitTrigger::PageHidden);
                Verdict::Ignored
            }
            WindowEvent::Unload => {
                self.begin_submission(SubmitTrigger::PageUnload);
                Verdict::Ignored
            }
            WindowEvent::BeforeUnload => {
                self.begin_submission(SubmitTrigger::BeforeUnload);
                Verdict::Ignored
            }
            WindowEvent::Focus | WindowEvent::VisibilityChange(Visibility::Visible) => {
                Verdict::Ignored
            }
        };
        self.on_verdict(verdict);
    }

    fn on_verdict(&mut self, verdict: Verdict) {
        let Verdict::Counted { violation, count, threshold_reached } = verdict else {
            return;
        };

        metrics::record_violation(violation.signal.as_str());
        tracing::warn!(
            attempt_id = %self.session.attempt().attempt_id,
            signal = violation.signal.as_str(),
            reason = %violation.reason,
            count,
            "Integrity violation recorded"
        );
        let threshold = self.session.integrity().threshold();
        self.notify(SessionNotice::ViolationRecorded {
            reason: violation.reason.clone(),
            count,
            threshold,
        });

        if threshold_reached {
            self.owed_violation = Some(violation.reason);
            self.hold_for_violation();
        }
    }

    /// Reserves the guard and schedules the delayed violation submission.
    fn hold_for_violation(&mut self) {
        let Some(reason) = self.owed_violation.clone() else {
            return;
        };
        if !self.session.guard().hold_for_violation() {
            tracing::debug!(reason = %reason, "Submission in progress; violation submit skipped");
            return;
        }

        self.session.integrity().disarm();
        self.notify(SessionNotice::ViolationWarning { reason: reason.clone() });

        let delay = self.app.settings().session().violation_submit_delay();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            if completions.send(Completion::ViolationDelayElapsed { reason }).is_err() {
                tracing::debug!("Session closed before violation submit");
            }
        });
    }

    fn on_command(&mut self, command: CandidateCommand) {
        match command {
            CandidateCommand::SelectAnswer { question, option } => {
                if self.reject_when_locked("Answers can no longer be changed") {
                    return;
                }
                if let Err(err) = self.session.select_answer(question, option) {
                    self.notify(SessionNotice::InvalidAction(err.to_string()));
                }
            }
            CandidateCommand::ToggleFlag(question) => {
                if self.reject_when_locked("The exam is being submitted") {
                    return;
                }
                if let Err(err) = self.session.toggle_flag(question) {
                    self.notify(SessionNotice::InvalidAction(err.to_string()));
                }
            }
            CandidateCommand::GoTo(question) => {
                if let Err(err) = self.session.go_to(question) {
                    self.notify(SessionNotice::InvalidAction(err.to_string()));
                }
            }
            CandidateCommand::Next => {
                self.session.next();
            }
            CandidateCommand::Previous => {
                self.session.previous();
            }
            CandidateCommand::SaveProgress => self.save_progress(),
            CandidateCommand::Submit => self.begin_submission(SubmitTrigger::Manual),
            CandidateCommand::OpenReport => self.session.integrity().set_report_open(true),
            CandidateCommand::CloseReport => self.session.integrity().set_report_open(false),
            CandidateCommand::FilePickerOpened => {
                self.session.integrity().file_picker_opened(Instant::now());
            }
            CandidateCommand::ReportIssue { description, attachments } => {
                self.report_issue(description, attachments);
            }
            CandidateCommand::Leave => self.finish(SessionOutcome::Left),
        }
    }

    fn reject_when_locked(&self, message: &str) -> bool {
        if self.is_locked() {
            self.notify(SessionNotice::InvalidAction(message.to_string()));
            return true;
        }
        false
    }

    fn save_progress(&self) {
        if self.reject_when_locked("The exam is being submitted") {
            return;
        }

        let attempt = self.session.attempt().clone();
        let answers = saved_answers(&attempt, self.session.answers());
        if answers.is_empty() {
            self.notify(SessionNotice::NothingToSave);
            return;
        }

        let answered = answers.len();
        let service = self.app.service();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = service.save_progress(&attempt.exam_id, &attempt.attempt_id, answers).await;
            if completions.send(Completion::ProgressSaved { answered, result }).is_err() {
                tracing::debug!("Session closed before progress save completed");
            }
        });
    }

    fn report_issue(&self, description: String, attachments: Vec<PathBuf>) {
        let attempt = self.session.attempt();
        let request = ReportIssueRequest {
            exam_id: attempt.exam_id.clone(),
            description: description.trim().to_string(),
            attachments,
            attempt_id: Some(attempt.attempt_id.clone()),
        };
        if let Err(errors) = request.validate() {
            self.notify(SessionNotice::InvalidAction(errors.to_string()));
            return;
        }

        let service = self.app.service();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = service.report_issue(request).await;
            if completions.send(Completion::IssueReported(result)).is_err() {
                tracing::debug!("Session closed before issue report completed");
            }
        });
    }

    /// Single entry point for every submission trigger.
    fn begin_submission(&mut self, trigger: SubmitTrigger) {
        let held_violation = (self.session.phase() == SubmissionPhase::ViolationDetected)
            .then(|| self.owed_violation.clone())
            .flatten();

        if !self.session.guard().try_begin(&trigger) {
            tracing::debug!(
                trigger = trigger.as_str(),
                phase = self.session.phase().as_str(),
                "Submission already underway; trigger ignored"
            );
            if trigger == SubmitTrigger::Manual {
                self.notify(SessionNotice::InvalidAction(
                    "The exam is already being submitted".to_string(),
                ));
            }
            return;
        }
        self.session.integrity().disarm();

        let attempt = self.session.attempt().clone();
        tracing::info!(
            attempt_id = %attempt.attempt_id,
            exam_id = %attempt.exam_id,
            trigger = trigger.as_str(),
            "Submitting exam"
        );

        if trigger == SubmitTrigger::BeforeUnload {
            let payload_trigger = match held_violation {
                Some(reason) => SubmitTrigger::Violation { reason },
                None => SubmitTrigger::BeforeUnload,
            };
            let request = self.session.submission(&payload_trigger);
            self.app.beacon().dispatch(&attempt.exam_id, &request);
            self.session.guard().succeed();
            metrics::record_submission(trigger.as_str(), "dispatched");
            self.finish(SessionOutcome::Submitted { trigger, result: None });
            return;
        }

        let service = self.app.service();
        let live = self.session.answers().clone();
        let elapsed = self.session.elapsed_seconds();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let answers = if trigger.reconciles_progress() {
                reconcile_with_saved(service.as_ref(), &attempt, live).await
            } else {
                live
            };
            let request = build_submission(&attempt, &answers, elapsed, &trigger);
            let result = service.submit_exam(&attempt.exam_id, request.clone()).await;
            if completions.send(Completion::Submitted { trigger, request, result }).is_err() {
                tracing::debug!("Session closed before submission completed");
            }
        });
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Submitted { trigger, request, result } => {
                self.on_submitted(trigger, request, result);
            }
            Completion::ViolationDelayElapsed { reason } => {
                self.begin_submission(SubmitTrigger::Violation { reason });
            }
            Completion::ProgressSaved { answered, result } => match result {
                Ok(()) => self.notify(SessionNotice::ProgressSaved { answered }),
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to save exam progress");
                    self.notify(SessionNotice::Error(format!(
                        "Failed to save progress: {}",
                        err.user_message()
                    )));
                }
            },
            Completion::IssueReported(result) => match result {
                Ok(response) => {
                    let message = if response.message.is_empty() {
                        "Issue reported successfully".to_string()
                    } else {
                        response.message
                    };
                    self.session.integrity().set_report_open(false);
                    self.notify(SessionNotice::IssueReported { message });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to report exam issue");
                    self.notify(SessionNotice::Error(format!(
                        "Failed to report issue: {}",
                        err.user_message()
                    )));
                }
            },
        }
    }

    fn on_submitted(
        &mut self,
        trigger: SubmitTrigger,
        request: SubmitExamRequest,
        result: Result<ExamResultResponse, ClientError>,
    ) {
        let attempt_id = self.session.attempt().attempt_id.clone();
        match result {
            Ok(result) => {
                self.session.guard().succeed();
                metrics::record_submission(trigger.as_str(), "success");
                tracing::info!(
                    attempt_id = %attempt_id,
                    trigger = trigger.as_str(),
                    score = result.score,
                    "Exam submitted"
                );

                let stored = StoredResult {
                    exam_title: self.session.attempt().exam_title.clone(),
                    result: result.clone(),
                    submitted_answers: request.answers,
                    violation_reason: request.violation_reason,
                    stored_at: format_offset(OffsetDateTime::now_utc()),
                };
                if let Err(err) = self.app.storage().store_result(&attempt_id, &stored) {
                    tracing::error!(attempt_id = %attempt_id, error = %err, "Failed to store exam result");
                }
                if trigger.is_automatic() {
                    self.app.storage().mark_auto_submitted(&attempt_id);
                }

                self.finish(SessionOutcome::Submitted { trigger, result: Some(result) });
            }
            Err(err) => {
                self.session.guard().fail();
                metrics::record_submission(trigger.as_str(), "failure");

                if trigger.is_automatic() {
                    tracing::error!(
                        attempt_id = %attempt_id,
                        trigger = trigger.as_str(),
                        error = %err,
                        "Automatic exam submission failed"
                    );
                    self.finish(SessionOutcome::Failed { trigger, error: err.user_message() });
                    return;
                }

                tracing::warn!(attempt_id = %attempt_id, error = %err, "Exam submission failed");
                self.notify(SessionNotice::Error(format!(
                    "Failed to submit exam: {}",
                    err.user_message()
                )));

                if self.session.timer_expired() {
                    self.begin_submission(SubmitTrigger::TimerExpired);
                } else {
                    self.session.integrity().arm();
                }
            }
        }
    }
}
