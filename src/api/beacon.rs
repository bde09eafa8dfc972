use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::task::JoinHandle;

use super::client::submit_path;
use super::UnloadBeacon;
use crate::core::config::Settings;
use crate::schemas::submission::SubmitExamRequest;
use crate::schemas::EntityId;

/// Posts the final answers on a detached task that is not tied to the session's lifetime.
#[derive(Debug, Clone)]
pub(crate) struct KeepaliveBeacon {
    client: Client,
    base_url: String,
    auth_token: String,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl KeepaliveBeacon {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build keepalive HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.api().base_url.clone(),
            auth_token: settings.api().auth_token.clone(),
            in_flight: Arc::default(),
        })
    }

    /// Waits up to `timeout` for dispatched requests before the process exits.
    pub(crate) async fn drain(&self, timeout: Duration) {
        let handles =
            std::mem::take(&mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner));
        if handles.is_empty() {
            return;
        }

        let wait = async {
            for handle in handles {
                if let Err(err) = handle.await {
                    tracing::warn!(error = %err, "Unload submission task failed");
                }
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            tracing::warn!("Unload submission still in flight at exit");
        }
    }
}

impl UnloadBeacon for KeepaliveBeacon {
    fn dispatch(&self, exam_id: &EntityId, request: &SubmitExamRequest) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(exam_id = %exam_id, "No runtime available for unload submission");
            return;
        };

        let url = format!("{}{}", self.base_url, submit_path(exam_id));
        let mut builder = self.client.post(url).json(request);
        if !self.auth_token.is_empty() {
            builder = builder.bearer_auth(&self.auth_token);
        }
        let exam_id = exam_id.clone();

        let task = runtime.spawn(async move {
            match builder.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(exam_id = %exam_id, "Unload submission delivered");
                }
                Ok(response) => {
                    tracing::warn!(
                        exam_id = %exam_id,
                        status = response.status().as_u16(),
                        "Unload submission rejected"
                    );
                }
                Err(err) => {
                    tracing::warn!(exam_id = %exam_id, error = %err, "Unload submission failed");
                }
            }
        });
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|handle| !handle.is_finished());
        in_flight.push(task);
    }
}
