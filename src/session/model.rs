use std::collections::BTreeSet;

use thiserror::Error;
use time::OffsetDateTime;

use crate::api::ClientError;
use crate::schemas::exam::{AttemptResponse, QuestionType};
use crate::schemas::EntityId;

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("exam attempt {attempt_id} could not be loaded: {source}")]
    AttemptUnavailable {
        attempt_id: EntityId,
        #[source]
        source: ClientError,
    },
    #[error("exam attempt {0} has no questions")]
    NoQuestions(EntityId),
    #[error("question {index} does not exist (the exam has {len} questions)")]
    QuestionOutOfRange { index: usize, len: usize },
    #[error("option {option} does not exist for question {question}")]
    OptionOutOfRange { question: usize, option: usize },
}

impl SessionError {
    /// Loading failures end the session; the candidate goes back to the catalog.
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self, SessionError::AttemptUnavailable { .. } | SessionError::NoQuestions(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuestionKind {
    SingleChoice,
    MultipleSelect,
}

impl From<QuestionType> for QuestionKind {
    fn from(value: QuestionType) -> Self {
        match value {
            QuestionType::SingleChoice => QuestionKind::SingleChoice,
            QuestionType::MultipleChoice => QuestionKind::MultipleSelect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnswerOption {
    pub(crate) option_id: EntityId,
    pub(crate) text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Question {
    pub(crate) question_id: EntityId,
    pub(crate) prompt: String,
    pub(crate) options: Vec<AnswerOption>,
    pub(crate) kind: QuestionKind,
    pub(crate) image_url: Option<String>,
}

impl Question {
    /// Server ids of the options at `indices`; indices past the option list are skipped.
    pub(crate) fn option_ids<'a>(
        &self,
        indices: impl IntoIterator<Item = &'a usize>,
    ) -> Vec<EntityId> {
        indices
            .into_iter()
            .filter_map(|index| self.options.get(*index))
            .map(|option| option.option_id.clone())
            .collect()
    }

    /// Local positions of the given server ids; unknown ids are dropped.
    pub(crate) fn option_indices(&self, ids: &[EntityId]) -> BTreeSet<usize> {
        ids.iter()
            .filter_map(|id| self.options.iter().position(|option| &option.option_id == id))
            .collect()
    }
}

/// One sitting of an exam, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExamAttempt {
    pub(crate) attempt_id: EntityId,
    pub(crate) exam_id: EntityId,
    pub(crate) exam_title: String,
    pub(crate) duration_minutes: Option<u32>,
    pub(crate) start_time: Option<OffsetDateTime>,
    pub(crate) end_time: Option<OffsetDateTime>,
    pub(crate) questions: Vec<Question>,
}

impl ExamAttempt {
    pub(crate) fn from_response(
        attempt_id: EntityId,
        response: AttemptResponse,
    ) -> Result<Self, SessionError> {
        if response.questions.is_empty() {
            return Err(SessionError::NoQuestions(attempt_id));
        }

        let questions = response
            .questions
            .into_iter()
            .map(|question| Question {
                question_id: question.question_id,
                prompt: question.content,
                options: question
                    .options
                    .into_iter()
                    .map(|option| AnswerOption { option_id: option.option_id, text: option.content })
                    .collect(),
                kind: question.question_type.into(),
                image_url: question.image_url,
            })
            .collect();

        Ok(Self {
            attempt_id,
            exam_id: response.exam_id,
            exam_title: response.exam_title.unwrap_or_default(),
            duration_minutes: response.duration_minutes.filter(|minutes| *minutes > 0),
            start_time: response.start_time,
            end_time: response.end_time,
            questions,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.questions.len()
    }

    pub(crate) fn question(&self, index: usize) -> Result<&Question, SessionError> {
        self.questions
            .get(index)
            .ok_or(SessionError::QuestionOutOfRange { index, len: self.questions.len() })
    }

    pub(crate) fn position_of(&self, question_id: &EntityId) -> Option<usize> {
        self.questions.iter().position(|question| &question.question_id == question_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn from_response_keeps_question_order_and_kinds() {
        let attempt = test_support::sample_attempt();
        assert_eq!(attempt.len(), 5);
        assert_eq!(attempt.questions[0].kind, QuestionKind::SingleChoice);
        assert_eq!(attempt.questions[2].kind, QuestionKind::MultipleSelect);
        assert_eq!(attempt.position_of(&EntityId::Number(103)), Some(3));
        assert_eq!(attempt.position_of(&EntityId::Number(999)), None);
    }

    #[test]
    fn from_response_rejects_empty_attempts() {
        let mut response = test_support::sample_attempt_response();
        response.questions.clear();

        let err = ExamAttempt::from_response(EntityId::Number(1), response).unwrap_err();
        assert!(matches!(err, SessionError::NoQuestions(_)));
        assert!(err.is_terminal());
    }

    #[test]
    fn question_lookup_is_bounds_checked() {
        let attempt = test_support::sample_attempt();
        let err = attempt.question(9).unwrap_err();
        assert!(matches!(err, SessionError::QuestionOutOfRange { index: 9, len: 5 }));
        assert!(!err.is_terminal());
    }

    #[test]
    fn option_ids_and_indices_translate_both_ways() {
        let attempt = test_support::sample_attempt();
        let question = &attempt.questions[2];

        let ids = question.option_ids(&[1, 3, 7]);
        assert_eq!(ids, vec![EntityId::Number(3001), EntityId::Number(3003)]);

        let indices = question.option_indices(&[EntityId::Number(3003), EntityId::Number(42)]);
        assert_eq!(indices.into_iter().collect::<Vec<_>>(), vec![3]);
    }
}
