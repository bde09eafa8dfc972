use std::collections::{BTreeMap, BTreeSet};

use super::model::QuestionKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    Single(usize),
    Multiple(BTreeSet<usize>),
}

impl Selection {
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Selection::Single(_) => false,
            Selection::Multiple(set) => set.is_empty(),
        }
    }

    pub(crate) fn indices(&self) -> Vec<usize> {
        match self {
            Selection::Single(index) => vec![*index],
            Selection::Multiple(set) => set.iter().copied().collect(),
        }
    }

    /// Builds the selection a question of `kind` holds for `indices`; `None` when empty.
    pub(crate) fn from_indices(kind: QuestionKind, indices: BTreeSet<usize>) -> Option<Self> {
        if indices.is_empty() {
            return None;
        }
        match kind {
            QuestionKind::SingleChoice => indices.first().copied().map(Selection::Single),
            QuestionKind::MultipleSelect => Some(Selection::Multiple(indices)),
        }
    }
}

/// Candidate selections keyed by question position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AnswerState {
    entries: BTreeMap<usize, Selection>,
}

impl AnswerState {
    pub(crate) fn select(&mut self, question: usize, kind: QuestionKind, option: usize) {
        match kind {
            QuestionKind::SingleChoice => {
                self.entries.insert(question, Selection::Single(option));
            }
            QuestionKind::MultipleSelect => {
                let mut set = match self.entries.remove(&question) {
                    Some(Selection::Multiple(set)) => set,
                    _ => BTreeSet::new(),
                };
                if !set.remove(&option) {
                    set.insert(option);
                }
                self.entries.insert(question, Selection::Multiple(set));
            }
        }
    }

    pub(crate) fn insert(&mut self, question: usize, selection: Selection) {
        self.entries.insert(question, selection);
    }

    pub(crate) fn get(&self, question: usize) -> Option<&Selection> {
        self.entries.get(&question)
    }

    pub(crate) fn is_answered(&self, question: usize) -> bool {
        self.entries.get(&question).is_some_and(|selection| !selection.is_empty())
    }

    pub(crate) fn answered_count(&self) -> usize {
        self.entries.values().filter(|selection| !selection.is_empty()).count()
    }

    /// Non-empty selections in question order.
    pub(crate) fn answered(&self) -> impl Iterator<Item = (usize, &Selection)> {
        self.entries
            .iter()
            .filter(|(_, selection)| !selection.is_empty())
            .map(|(question, selection)| (*question, selection))
    }

    /// Overlays `restored` on a copy of this state; restored entries win per question.
    pub(crate) fn merged_with(&self, restored: AnswerState) -> AnswerState {
        let mut merged = self.clone();
        merged.entries.extend(restored.entries);
        merged
    }
}

/// Questions marked for review. Local only, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FlagSet {
    flagged: BTreeSet<usize>,
}

impl FlagSet {
    /// Returns whether the question is flagged after the toggle.
    pub(crate) fn toggle(&mut self, question: usize) -> bool {
        if self.flagged.remove(&question) {
            false
        } else {
            self.flagged.insert(question);
            true
        }
    }

    pub(crate) fn contains(&self, question: usize) -> bool {
        self.flagged.contains(&question)
    }

    pub(crate) fn len(&self) -> usize {
        self.flagged.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuestionStatus {
    Answered,
    Flagged,
    Unanswered,
}

pub(crate) fn question_status(
    answers: &AnswerState,
    flags: &FlagSet,
    question: usize,
) -> QuestionStatus {
    if answers.is_answered(question) {
        QuestionStatus::Answered
    } else if flags.contains(question) {
        QuestionStatus::Flagged
    } else {
        QuestionStatus::Unanswered
    }
}
