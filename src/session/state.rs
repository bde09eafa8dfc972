use std::sync::Arc;

use time::OffsetDateTime;

use super::answers::{question_status, AnswerState, FlagSet, QuestionStatus};
use super::integrity::IntegrityMonitor;
use super::model::{ExamAttempt, SessionError};
use super::submission::{build_submission, SubmissionGuard, SubmissionPhase, SubmitTrigger};
use super::timer::{initial_remaining_seconds, Countdown, ElapsedClock, TickOutcome};
use crate::core::config::SessionSettings;
use crate::schemas::submission::SubmitExamRequest;

/// Snapshot published to whatever renders the exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionView {
    pub(crate) exam_title: String,
    pub(crate) time_remaining: u64,
    pub(crate) current_question: usize,
    /// Selected option positions of the current question.
    pub(crate) selected: Vec<usize>,
    pub(crate) statuses: Vec<QuestionStatus>,
    pub(crate) answered: usize,
    pub(crate) unanswered: usize,
    pub(crate) flagged: usize,
    pub(crate) violation_count: u32,
    pub(crate) report_open: bool,
    pub(crate) phase: SubmissionPhase,
}

/// All mutable state of one exam attempt, owned by the controller.
#[derive(Debug)]
pub(crate) struct ExamSession {
    attempt: Arc<ExamAttempt>,
    answers: AnswerState,
    flags: FlagSet,
    current: usize,
    countdown: Countdown,
    clock: ElapsedClock,
    integrity: IntegrityMonitor,
    guard: SubmissionGuard,
}

impl ExamSession {
    pub(crate) fn new(attempt: ExamAttempt, settings: &SessionSettings, now: OffsetDateTime) -> Self {
        let remaining = initial_remaining_seconds(
            attempt.start_time,
            attempt.end_time,
            attempt.duration_minutes,
            settings.fallback_duration_minutes,
            now,
        );

        Self {
            attempt: Arc::new(attempt),
            answers: AnswerState::default(),
            flags: FlagSet::default(),
            current: 0,
            countdown: Countdown::new(remaining),
            clock: ElapsedClock::start(),
            integrity: IntegrityMonitor::new(settings),
            guard: SubmissionGuard::default(),
        }
    }

    pub(crate) fn attempt(&self) -> &Arc<ExamAttempt> {
        &self.attempt
    }

    pub(crate) fn answers(&self) -> &AnswerState {
        &self.answers
    }

    pub(crate) fn integrity(&mut self) -> &mut IntegrityMonitor {
        &mut self.integrity
    }

    pub(crate) fn guard(&mut self) -> &mut SubmissionGuard {
        &mut self.guard
    }

    pub(crate) fn phase(&self) -> SubmissionPhase {
        self.guard.phase()
    }

    pub(crate) fn select_answer(&mut self, question: usize, option: usize) -> Result<(), SessionError> {
        let target = self.attempt.question(question)?;
        if option >= target.options.len() {
            return Err(SessionError::OptionOutOfRange { question, option });
        }
        self.answers.select(question, target.kind, option);
        Ok(())
    }

    pub(crate) fn toggle_flag(&mut self, question: usize) -> Result<bool, SessionError> {
        self.attempt.question(question)?;
        Ok(self.flags.toggle(question))
    }

    pub(crate) fn go_to(&mut self, question: usize) -> Result<usize, SessionError> {
        self.attempt.question(question)?;
        self.current = question;
        Ok(self.current)
    }

    pub(crate) fn next(&mut self) -> usize {
        self.current = (self.current + 1).min(self.attempt.len() - 1);
        self.current
    }

    pub(crate) fn previous(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    pub(crate) fn question_status(&self, question: usize) -> QuestionStatus {
        question_status(&self.answers, &self.flags, question)
    }

    pub(crate) fn unanswered_count(&self) -> usize {
        (0..self.attempt.len()).filter(|question| !self.answers.is_answered(*question)).count()
    }

    pub(crate) fn timer_expired(&self) -> bool {
        self.countdown.is_expired()
    }

    pub(crate) fn tick(&mut self) -> TickOutcome {
        self.countdown.tick()
    }

    pub(crate) fn elapsed_seconds(&self) -> u64 {
        self.clock.elapsed_seconds()
    }

    /// Payload built from the live in-memory answers.
    pub(crate) fn submission(&self, trigger: &SubmitTrigger) -> SubmitExamRequest {
        build_submission(&self.attempt, &self.answers, self.elapsed_seconds(), trigger)
    }

    pub(crate) fn view(&self) -> SessionView {
        let statuses: Vec<QuestionStatus> =
            (0..self.attempt.len()).map(|question| self.question_status(question)).collect();
        SessionView {
            exam_title: self.attempt.exam_title.clone(),
            time_remaining: self.countdown.remaining(),
            current_question: self.current,
            selected: self
                .answers
                .get(self.current)
                .map(|selection| selection.indices())
                .unwrap_or_default(),
            answered: self.answers.answered_count(),
            unanswered: self.unanswered_count(),
            flagged: self.flags.len(),
            statuses,
            violation_count: self.integrity.count(),
            report_open: self.integrity.report_open(),
            phase: self.guard.phase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::answers::Selection;
    use crate::test_support;
    use time::Duration;

    fn session() -> ExamSession {
        ExamSession::new(
            test_support::sample_attempt(),
            &SessionSettings::default(),
            OffsetDateTime::now_utc(),
        )
    }

    #[test]
    fn stale_attempt_shows_full_duration() {
        let now = OffsetDateTime::now_utc();
        let mut attempt = test_support::sample_attempt();
        attempt.start_time = Some(now - Duration::minutes(61));
        attempt.end_time = None;
        attempt.duration_minutes = Some(60);

        let session = ExamSession::new(attempt, &SessionSettings::default(), now);
        assert_eq!(session.view().time_remaining, 3600);
    }

    #[test]
    fn answers_are_validated_against_the_attempt() {
        let mut session = session();
        assert!(matches!(
            session.select_answer(7, 0),
            Err(SessionError::QuestionOutOfRange { index: 7, .. })
        ));
        assert!(matches!(
            session.select_answer(0, 3),
            Err(SessionError::OptionOutOfRange { question: 0, option: 3 })
        ));

        session.select_answer(0, 0).expect("select");
        session.select_answer(0, 1).expect("reselect");
        assert_eq!(session.answers().get(0), Some(&Selection::Single(1)));
    }

    #[test]
    fn view_reports_statuses_and_counts() {
        let mut session = session();
        session.select_answer(0, 2).expect("select");
        session.select_answer(2, 1).expect("select multi");
        assert!(session.toggle_flag(3).expect("flag"));

        let view = session.view();
        assert_eq!(view.answered, 2);
        assert_eq!(view.unanswered, 3);
        assert_eq!(view.flagged, 1);
        assert_eq!(
            view.statuses,
            vec![
                QuestionStatus::Answered,
                QuestionStatus::Unanswered,
                QuestionStatus::Answered,
                QuestionStatus::Flagged,
                QuestionStatus::Unanswered,
            ]
        );
        assert_eq!(view.phase, SubmissionPhase::Idle);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut session = session();
        assert_eq!(session.previous(), 0);
        assert_eq!(session.go_to(4).expect("go to"), 4);
        assert_eq!(session.next(), 4);
        assert!(session.go_to(5).is_err());
        assert_eq!(session.view().current_question, 4);
    }
}
