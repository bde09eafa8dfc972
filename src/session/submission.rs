use super::answers::AnswerState;
use super::model::ExamAttempt;
use crate::schemas::submission::{SubmissionAnswer, SubmitExamRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubmitTrigger {
    Manual,
    TimerExpired,
    Violation { reason: String },
    PageHidden,
    PageUnload,
    BeforeUnload,
}

impl SubmitTrigger {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            SubmitTrigger::Manual => "manual",
            SubmitTrigger::TimerExpired => "timer_expired",
            SubmitTrigger::Violation { .. } => "violation",
            SubmitTrigger::PageHidden => "page_hidden",
            SubmitTrigger::PageUnload => "page_unload",
            SubmitTrigger::BeforeUnload => "before_unload",
        }
    }

    /// Automatic triggers keep the guard even when the submission fails.
    pub(crate) fn is_automatic(&self) -> bool {
        !matches!(self, SubmitTrigger::Manual)
    }

    /// Hide/unload submissions merge server-saved progress first.
    pub(crate) fn reconciles_progress(&self) -> bool {
        matches!(self, SubmitTrigger::PageHidden | SubmitTrigger::PageUnload)
    }

    pub(crate) fn violation_reason(&self) -> Option<&str> {
        match self {
            SubmitTrigger::Violation { reason } => Some(reason),
            _ => None,
        }
    }
}

/// One entry per question in attempt order; unanswered questions carry no option ids.
pub(crate) fn build_submission(
    attempt: &ExamAttempt,
    answers: &AnswerState,
    elapsed_seconds: u64,
    trigger: &SubmitTrigger,
) -> SubmitExamRequest {
    let entries = attempt
        .questions
        .iter()
        .enumerate()
        .map(|(position, question)| SubmissionAnswer {
            question_id: question.question_id.clone(),
            selected_option_ids: answers
                .get(position)
                .map(|selection| question.option_ids(&selection.indices()))
                .unwrap_or_default(),
            text_answer: None,
        })
        .collect();

    let violation_reason = trigger.violation_reason().map(str::to_string);
    SubmitExamRequest {
        attempt_id: attempt.attempt_id.clone(),
        answers: entries,
        time_spent: elapsed_seconds,
        is_violation_submit: violation_reason.is_some(),
        violation_reason,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmissionPhase {
    Idle,
    ViolationDetected,
    Submitting,
    Submitted,
    Failed,
}

impl SubmissionPhase {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SubmissionPhase::Idle => "idle",
            SubmissionPhase::ViolationDetected => "violation_detected",
            SubmissionPhase::Submitting => "submitting",
            SubmissionPhase::Submitted => "submitted",
            SubmissionPhase::Failed => "failed",
        }
    }
}

/// The single-submission guard shared by every trigger.
#[derive(Debug)]
pub(crate) struct SubmissionGuard {
    phase: SubmissionPhase,
    in_flight: Option<SubmitTrigger>,
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self { phase: SubmissionPhase::Idle, in_flight: None }
    }
}

impl SubmissionGuard {
    pub(crate) fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    /// Reserves the session for a pending violation submission.
    pub(crate) fn hold_for_violation(&mut self) -> bool {
        if self.phase != SubmissionPhase::Idle {
            return false;
        }
        self.phase = SubmissionPhase::ViolationDetected;
        true
    }

    /// Check-and-set before any asynchronous submission work starts.
    pub(crate) fn try_begin(&mut self, trigger: &SubmitTrigger) -> bool {
        let allowed = match self.phase {
            SubmissionPhase::Idle => true,
            SubmissionPhase::ViolationDetected => {
                matches!(trigger, SubmitTrigger::Violation { .. } | SubmitTrigger::BeforeUnload)
            }
            _ => false,
        };
        if allowed {
            self.phase = SubmissionPhase::Submitting;
            self.in_flight = Some(trigger.clone());
        }
        allowed
    }

    pub(crate) fn succeed(&mut self) {
        self.phase = SubmissionPhase::Submitted;
    }

    /// A failed manual submission re-enables submitting; automatic ones stay terminal.
    pub(crate) fn fail(&mut self) {
        let manual = matches!(self.in_flight, Some(SubmitTrigger::Manual));
        self.phase = if manual { SubmissionPhase::Idle } else { SubmissionPhase::Failed };
        if manual {
            self.in_flight = None;
        }
    }
}
