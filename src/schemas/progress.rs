use serde::{Deserialize, Serialize};

use super::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProgressAnswer {
    pub(crate) question_id: EntityId,
    #[serde(default)]
    pub(crate) selected_option_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveProgressRequest {
    pub(crate) attempt_id: EntityId,
    pub(crate) answers: Vec<ProgressAnswer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RestoreProgressResponse {
    #[serde(default)]
    pub(crate) answers: Vec<ProgressAnswer>,
}
