use async_trait::async_trait;

use crate::schemas::exam::AttemptResponse;
use crate::schemas::issue::{ReportIssueRequest, ReportIssueResponse};
use crate::schemas::progress::{ProgressAnswer, RestoreProgressResponse};
use crate::schemas::submission::{ExamResultResponse, SubmitExamRequest};
use crate::schemas::EntityId;

pub(crate) mod beacon;
pub(crate) mod client;
pub(crate) mod errors;

pub(crate) use beacon::KeepaliveBeacon;
pub(crate) use client::HttpExamService;
pub(crate) use errors::ClientError;

/// The backend collaborators an exam session talks to.
#[async_trait]
pub(crate) trait ExamService: Send + Sync {
    async fn get_attempt(&self, attempt_id: &EntityId) -> Result<AttemptResponse, ClientError>;

    async fn save_progress(
        &self,
        exam_id: &EntityId,
        attempt_id: &EntityId,
        answers: Vec<ProgressAnswer>,
    ) -> Result<(), ClientError>;

    /// `Ok(None)` when nothing was ever saved for the attempt.
    async fn restore_progress(
        &self,
        exam_id: &EntityId,
        attempt_id: &EntityId,
    ) -> Result<Option<RestoreProgressResponse>, ClientError>;

    async fn submit_exam(
        &self,
        exam_id: &EntityId,
        request: SubmitExamRequest,
    ) -> Result<ExamResultResponse, ClientError>;

    async fn report_issue(
        &self,
        request: ReportIssueRequest,
    ) -> Result<ReportIssueResponse, ClientError>;
}

/// Fire-and-forget submission used while the page is unloading.
///
/// Delivery is at most once and unconfirmed: the caller never learns whether the
/// request reached the server.
pub(crate) trait UnloadBeacon: Send + Sync {
    fn dispatch(&self, exam_id: &EntityId, request: &SubmitExamRequest);
}
