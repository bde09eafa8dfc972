use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::{ClientError, ExamService};
use crate::core::config::Settings;
use crate::schemas::exam::AttemptResponse;
use crate::schemas::issue::{ReportIssueRequest, ReportIssueResponse};
use crate::schemas::progress::{ProgressAnswer, RestoreProgressResponse, SaveProgressRequest};
use crate::schemas::submission::{ExamResultResponse, SubmitExamRequest};
use crate::schemas::EntityId;

pub(crate) fn attempt_path(attempt_id: &EntityId) -> String {
    format!("/api/ExamAttempts/{attempt_id}")
}

pub(crate) fn progress_path(exam_id: &EntityId, attempt_id: &EntityId) -> String {
    format!("/api/Exams/{exam_id}/progress/{attempt_id}")
}

pub(crate) fn submit_path(exam_id: &EntityId) -> String {
    format!("/api/Exams/{exam_id}/submit")
}

pub(crate) fn report_issue_path(exam_id: &EntityId) -> String {
    format!("/api/Exams/{exam_id}/report-issue")
}

#[derive(Debug, Clone)]
pub(crate) struct HttpExamService {
    client: Client,
    base_url: String,
    auth_token: String,
}

impl HttpExamService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.api().request_timeout_seconds.max(1));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build exam API HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.api().base_url.clone(),
            auth_token: settings.api().auth_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.auth_token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.auth_token)
        }
    }
}

#[async_trait]
impl ExamService for HttpExamService {
    async fn get_attempt(&self, attempt_id: &EntityId) -> Result<AttemptResponse, ClientError> {
        let response =
            self.authorized(self.client.get(self.url(&attempt_path(attempt_id)))).send().await?;
        read_json(response).await
    }

    async fn save_progress(
        &self,
        exam_id: &EntityId,
        attempt_id: &EntityId,
        answers: Vec<ProgressAnswer>,
    ) -> Result<(), ClientError> {
        let body = SaveProgressRequest { attempt_id: attempt_id.clone(), answers };
        let response = self
            .authorized(self.client.post(self.url(&progress_path(exam_id, attempt_id))))
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }

    async fn restore_progress(
        &self,
        exam_id: &EntityId,
        attempt_id: &EntityId,
    ) -> Result<Option<RestoreProgressResponse>, ClientError> {
        let response = self
            .authorized(self.client.get(self.url(&progress_path(exam_id, attempt_id))))
            .send()
            .await?;

        let raw_body = match ensure_success(response).await {
            Ok(raw_body) => raw_body,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        if raw_body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<Option<RestoreProgressResponse>>(&raw_body)
            .map_err(|err| ClientError::Decode(err.to_string()))
    }

    async fn submit_exam(
        &self,
        exam_id: &EntityId,
        request: SubmitExamRequest,
    ) -> Result<ExamResultResponse, ClientError> {
        let response = self
            .authorized(self.client.post(self.url(&submit_path(exam_id))))
            .json(&request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn report_issue(
        &self,
        request: ReportIssueRequest,
    ) -> Result<ReportIssueResponse, ClientError> {
        let mut form = Form::new().text("description", request.description.clone());
        if let Some(attempt_id) = &request.attempt_id {
            form = form.text("attemptId", attempt_id.to_string());
        }
        for path in &request.attachments {
            form = form.part("attachments", attachment_part(path).await?);
        }

        let response = self
            .authorized(self.client.post(self.url(&report_issue_path(&request.exam_id))))
            .multipart(form)
            .send()
            .await?;

        let raw_body = ensure_success(response).await?;
        if raw_body.trim().is_empty() {
            return Ok(ReportIssueResponse::default());
        }
        serde_json::from_str(&raw_body).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

async fn attachment_part(path: &Path) -> Result<Part, ClientError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Attachment {
        path: path.display().to_string(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

/// Returns the body of a successful response, or a `Status` error carrying the server detail.
async fn ensure_success(response: Response) -> Result<String, ClientError> {
    let status = response.status();
    let raw_body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::from_status(status.as_u16(), &raw_body));
    }
    Ok(raw_body)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let raw_body = ensure_success(response).await?;
    serde_json::from_str(&raw_body).map_err(|err| ClientError::Decode(err.to_string()))
}
