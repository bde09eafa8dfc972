use std::path::PathBuf;

use serde::Deserialize;
use validator::Validate;

use super::EntityId;

#[derive(Debug, Clone, Validate)]
pub(crate) struct ReportIssueRequest {
    pub(crate) exam_id: EntityId,
    #[validate(length(min = 1, max = 2000, message = "description must be 1-2000 characters"))]
    pub(crate) description: String,
    #[validate(length(max = 5, message = "at most 5 attachments are allowed"))]
    pub(crate) attachments: Vec<PathBuf>,
    pub(crate) attempt_id: Option<EntityId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ReportIssueResponse {
    #[serde(default)]
    pub(crate) message: String,
}
