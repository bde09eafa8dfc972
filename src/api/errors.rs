use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("failed to read attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Builds a `Status` error from a non-success response body.
    pub(crate) fn from_status(status: u16, raw_body: &str) -> Self {
        let detail = serde_json::from_str::<Value>(raw_body)
            .map(|parsed| extract_error_message(&parsed))
            .unwrap_or_else(|_| {
                let trimmed = raw_body.trim();
                if trimmed.is_empty() {
                    "no details".to_string()
                } else {
                    trimmed.chars().take(200).collect()
                }
            });
        Self::Status { status, detail }
    }

    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status: 404, .. })
    }

    /// Short text suitable for a dismissible notice.
    pub(crate) fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) => {
                "Network error. Check your connection and try again.".to_string()
            }
            ClientError::Status { detail, .. } => detail.clone(),
            ClientError::Decode(_) => "The server sent an unexpected response.".to_string(),
            ClientError::Attachment { path, .. } => format!("Could not read attachment {path}"),
        }
    }
}

fn extract_error_message(payload: &Value) -> String {
    if let Some(detail) = payload.get("detail").and_then(Value::as_str) {
        return detail.to_string();
    }

    if let Some(errors) = payload.get("errors").and_then(Value::as_object) {
        let joined = errors
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; ");
        if !joined.is_empty() {
            return joined;
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("title").and_then(Value::as_str))
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}
