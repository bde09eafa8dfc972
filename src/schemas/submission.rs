use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionAnswer {
    pub(crate) question_id: EntityId,
    pub(crate) selected_option_ids: Vec<EntityId>,
    pub(crate) text_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitExamRequest {
    pub(crate) attempt_id: EntityId,
    pub(crate) answers: Vec<SubmissionAnswer>,
    /// Seconds actually spent, measured from the monotonic session start.
    pub(crate) time_spent: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) is_violation_submit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) violation_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamResultResponse {
    #[serde(default)]
    pub(crate) score: f64,
    #[serde(default)]
    pub(crate) max_score: f64,
    #[serde(default)]
    pub(crate) percentage: f64,
    #[serde(default)]
    pub(crate) is_passed: bool,
    #[serde(default)]
    pub(crate) time_spent_minutes: Option<f64>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submit_request_omits_violation_fields_unless_set() {
        let request = SubmitExamRequest {
            attempt_id: EntityId::Number(5),
            answers: vec![SubmissionAnswer {
                question_id: EntityId::Number(1),
                selected_option_ids: vec![],
                text_answer: None,
            }],
            time_spent: 90,
            is_violation_submit: false,
            violation_reason: None,
        };

        let value = serde_json::to_value(&request).expect("request json");
        assert_eq!(
            value,
            json!({
                "attemptId": 5,
                "answers": [{"questionId": 1, "selectedOptionIds": [], "textAnswer": null}],
                "timeSpent": 90
            })
        );
    }

    #[test]
    fn result_keeps_unknown_fields() {
        let result: ExamResultResponse = serde_json::from_value(json!({
            "score": 8,
            "maxScore": 10,
            "percentage": 80.0,
            "isPassed": true,
            "timeSpentMinutes": 12.5,
            "certificateId": "c-77"
        }))
        .expect("result");

        assert!(result.is_passed);
        assert_eq!(result.max_score, 10.0);
        assert_eq!(result.extra.get("certificateId"), Some(&json!("c-77")));
    }
}
