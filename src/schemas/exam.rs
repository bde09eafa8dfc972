use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::EntityId;
use crate::core::time::deserialize_optional_timestamp;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptResponse {
    pub(crate) exam_id: EntityId,
    #[serde(default)]
    pub(crate) exam_title: Option<String>,
    #[serde(default)]
    pub(crate) duration_minutes: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub(crate) start_time: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub(crate) end_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub(crate) questions: Vec<QuestionDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionDto {
    #[serde(alias = "id")]
    pub(crate) question_id: EntityId,
    #[serde(default, alias = "text")]
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) options: Vec<OptionDto>,
    #[serde(default)]
    pub(crate) question_type: QuestionType,
    #[serde(default)]
    pub(crate) image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OptionDto {
    #[serde(alias = "id")]
    pub(crate) option_id: EntityId,
    #[serde(default, alias = "text")]
    pub(crate) content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) enum QuestionType {
    #[default]
    SingleChoice,
    MultipleChoice,
}

impl QuestionType {
    fn from_wire(value: &Value) -> Self {
        match value {
            Value::String(raw) => {
                let normalized: String = raw
                    .chars()
                    .filter(|ch| ch.is_ascii_alphanumeric())
                    .map(|ch| ch.to_ascii_lowercase())
                    .collect();
                if normalized.starts_with("multi") {
                    QuestionType::MultipleChoice
                } else {
                    QuestionType::SingleChoice
                }
            }
            Value::Number(number) if number.as_i64() == Some(1) => QuestionType::MultipleChoice,
            _ => QuestionType::SingleChoice,
        }
    }
}

impl<'de> Deserialize<'de> for QuestionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(QuestionType::from_wire(&value))
    }
}
