use super::answers::{AnswerState, Selection};
use super::model::ExamAttempt;
use crate::api::ExamService;
use crate::schemas::progress::{ProgressAnswer, RestoreProgressResponse};

/// Answered questions only, with option positions resolved to server ids.
pub(crate) fn saved_answers(attempt: &ExamAttempt, answers: &AnswerState) -> Vec<ProgressAnswer> {
    answers
        .answered()
        .filter_map(|(position, selection)| {
            let question = attempt.questions.get(position)?;
            let ids = question.option_ids(&selection.indices());
            if ids.is_empty() {
                return None;
            }
            Some(ProgressAnswer {
                question_id: question.question_id.clone(),
                selected_option_ids: ids,
            })
        })
        .collect()
}

/// Maps persisted answers back to local positions. Unknown questions or options are dropped.
pub(crate) fn restored_answers(
    attempt: &ExamAttempt,
    saved: &RestoreProgressResponse,
) -> AnswerState {
    let mut restored = AnswerState::default();
    for answer in &saved.answers {
        let Some(position) = attempt.position_of(&answer.question_id) else {
            continue;
        };
        let question = &attempt.questions[position];
        let indices = question.option_indices(&answer.selected_option_ids);
        if let Some(selection) = Selection::from_indices(question.kind, indices) {
            restored.insert(position, selection);
        }
    }
    restored
}

/// Overlays the server copy of saved progress onto `live`.
///
/// Best effort: any failure falls back to `live` unchanged.
pub(crate) async fn reconcile_with_saved(
    service: &dyn ExamService,
    attempt: &ExamAttempt,
    live: AnswerState,
) -> AnswerState {
    match service.restore_progress(&attempt.exam_id, &attempt.attempt_id).await {
        Ok(Some(saved)) => {
            let restored = restored_answers(attempt, &saved);
            tracing::debug!(
                attempt_id = %attempt.attempt_id,
                restored = restored.answered_count(),
                "Merging saved progress before submission"
            );
            live.merged_with(restored)
        }
        Ok(None) => live,
        Err(err) => {
            tracing::warn!(
                attempt_id = %attempt.attempt_id,
                error = %err,
                "Failed to restore saved progress; submitting in-memory answers"
            );
            live
        }
    }
}
